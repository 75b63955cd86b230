pub mod altimeter;
pub mod error;
pub mod manager;
pub mod reading;
pub mod view;
