// Data model - certificate records, transient observations, notification rules

pub mod certificate;
pub mod notification;
pub mod observation;

pub use certificate::{CertificateRecord, CertificateStatus, Environment, ImportMethod};
pub use notification::{NotificationLogEntry, NotificationRule, SendStatus};
pub use observation::{Observation, ObservationSource};
