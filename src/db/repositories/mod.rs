pub mod operator;

pub use operator::SeaOrmOperatorStore;
