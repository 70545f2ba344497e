mod herrick_gibbs;
mod lambert;
