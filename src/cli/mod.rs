pub mod doctor;
pub mod inbox;
pub mod maintenance;
pub mod remind;
pub mod scheduler;
