//! Client entity (§3).

use serde::Serialize;

use super::{ClientName, SessionId};

#[derive(Debug, Clone)]
pub struct Client {
    pub name: ClientName,
    pub pid: i32,
    pub session: SessionId,
}

impl Client {
    pub fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            name: self.name.clone(),
            pid: self.pid,
            session: self.session.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientSnapshot {
    pub name: ClientName,
    pub pid: i32,
    pub session: SessionId,
}
