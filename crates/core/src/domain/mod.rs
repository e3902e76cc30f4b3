pub mod criteria;
pub mod session;
pub mod travel;
pub mod trip;
