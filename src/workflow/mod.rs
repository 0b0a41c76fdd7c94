pub mod batch;
pub mod import;
pub mod ticket;
pub mod validator;
