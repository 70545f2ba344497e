mod propagators;
mod stm;
