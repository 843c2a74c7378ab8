pub mod operators;

pub mod prelude {
    pub use super::operators::Entity as Operators;
}
