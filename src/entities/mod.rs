pub mod brand;
pub mod employee;
pub mod frame;
pub mod order;
