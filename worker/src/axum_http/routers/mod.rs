pub mod notification_replay;
