pub mod attendance_record;
pub mod class_session;
pub mod face_reference;
pub mod principal;
pub mod schedule_slot;
pub mod teacher;

pub use attendance_record::Entity as AttendanceRecord;
pub use class_session::Entity as ClassSession;
pub use face_reference::Entity as FaceReference;
pub use principal::Entity as Principal;
pub use schedule_slot::Entity as ScheduleSlot;
pub use teacher::Entity as Teacher;
