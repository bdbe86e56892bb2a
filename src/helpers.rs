pub mod dates;
pub mod homework;
pub mod session;
pub mod timetable;
pub mod transport;
