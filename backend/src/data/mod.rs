pub mod images;
pub mod scaler;
pub mod schema;
pub mod tabular;
