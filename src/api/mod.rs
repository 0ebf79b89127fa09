pub mod assignment;
pub mod technician;
pub mod ticket;

pub use self::{
    assignment::Record as AssignmentRecord, technician::Account,
    ticket::Ticket,
};
