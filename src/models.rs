pub mod homework;
mod lenient;
pub mod rpc;
pub mod timetable;
