pub mod plans;
pub mod points_of_sale;
pub mod sales;
pub mod tickets;
