pub mod admin_validator;
