pub mod attendance;
pub mod groups;
pub mod hours;
pub mod notifications;
pub mod reports;
pub mod shifts;
pub mod volunteers;
