pub mod m202510010001_create_principals;
pub mod m202510010002_create_teachers;
pub mod m202510010003_create_face_references;
pub mod m202510010004_create_schedule_slots;
pub mod m202510010005_create_class_sessions;
pub mod m202510010006_create_attendance_records;
