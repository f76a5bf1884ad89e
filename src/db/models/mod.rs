//! SeaORM entity models
//!
//! Persistence for the routing hierarchy (schedule -> round -> assignment)
//! plus the collaborating entities the workflow reads and mutates
//! (thesis, user directory, notification sink).

mod assignment;
mod notification;
mod round;
mod schedule;
mod thesis;
mod user;

pub use thesis::{
    ActiveModel as ThesisActiveModel, Column as ThesisColumn, Entity as ThesisEntity,
    Model as Thesis, RoutingStatus,
};

pub use user::{
    ActiveModel as UserActiveModel, Column as UserColumn, Entity as UserEntity, Model as User,
};

pub use notification::{
    ActiveModel as NotificationActiveModel, Column as NotificationColumn,
    Entity as NotificationEntity, Model as Notification, NotificationKind,
};

pub use schedule::{
    ActiveModel as ScheduleActiveModel, Column as ScheduleColumn, Entity as ScheduleEntity,
    Model as Schedule, ScheduleStatus,
};

pub use round::{
    ActiveModel as RoundActiveModel, Column as RoundColumn, Entity as RoundEntity, Model as Round,
    RoundStatus,
};

pub use assignment::{
    ActiveModel as AssignmentActiveModel, AssignmentStatus, Column as AssignmentColumn,
    Entity as AssignmentEntity, Model as Assignment,
};
