pub mod attendance_record;
pub mod group;
pub mod hour_ledger;
pub mod notification;
pub mod role;
pub mod shift;
pub mod volunteer;
