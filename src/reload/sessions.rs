//! Sessions reload (§4.8 "Sessions reload").
//!
//! Entry point for a full refresh pass: recursively drives windows and
//! clients reload once session ids have been synced, and bootstraps a temp
//! CC the moment the server has no sessions at all.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::model::{Model, Session, StatusBar, TEMP_SESSION_NAME};
use crate::reload::clients::clients_reload;
use crate::reload::options::{OptionScope, OptionTarget};
use crate::reload::windows::windows_reload;
use crate::refresh::{Closure, ClosureQueue};

use super::Runtime;

struct ObservedSession {
    id: String,
    name: String,
}

fn parse_session_line(line: &str) -> Result<ObservedSession> {
    let (id, name) = line
        .split_once('|')
        .ok_or_else(|| Error::Invalid(format!("sessions reload: malformed line {line:?}")))?;
    Ok(ObservedSession {
        id: id.trim().to_string(),
        name: name.to_string(),
    })
}

pub async fn sessions_reload(model: &mut Model, rt: &mut impl Runtime) -> Result<ClosureQueue> {
    let mut closures = ClosureQueue::new();

    let lines = rt
        .list(&[
            "list-sessions".into(),
            "-F".into(),
            "#{session_id} |#{session_name}".into(),
        ])
        .await?;

    let mut observed = Vec::with_capacity(lines.len());
    for line in &lines {
        observed.push(parse_session_line(line)?);
    }

    let observed_ids: HashSet<&str> = observed.iter().map(|o| o.id.as_str()).collect();
    let existing_ids: Vec<String> = model.sessions.keys().cloned().collect();
    for id in existing_ids {
        if !observed_ids.contains(id.as_str()) {
            if let Some(session) = model.sessions.remove(&id) {
                closures.add(Closure::SessionClosed(session.snapshot()));
            }
        }
    }

    for obs in &observed {
        if !model.sessions.contains_key(&obs.id) {
            let session = Session::new(obs.id.clone(), obs.name.clone());
            // New closure is suppressed for the temp session at dispatch
            // time (the snapshot still carries its name so the dispatcher
            // can recognize it), not skipped here.
            closures.add(Closure::NewSession(session.snapshot()));
            model.sessions.insert(session.id.clone(), session);
        } else if let Some(session) = model.sessions.get_mut(&obs.id) {
            session.name = obs.name.clone();
        }
    }

    let global_status = rt
        .get_option("status", None, OptionScope::Global, OptionTarget::Session)
        .await
        .unwrap_or_default();
    let global_position = rt
        .get_option(
            "status-position",
            None,
            OptionScope::Global,
            OptionTarget::Session,
        )
        .await
        .unwrap_or_default();
    let default_bar = StatusBar::from_options(
        global_status.trim(),
        global_position.trim(),
        StatusBar::Top,
    );

    for obs in &observed {
        let local_status = rt
            .get_option(
                "status",
                Some(&obs.id),
                OptionScope::Local,
                OptionTarget::Session,
            )
            .await
            .unwrap_or_default();
        let local_position = rt
            .get_option(
                "status-position",
                Some(&obs.id),
                OptionScope::Local,
                OptionTarget::Session,
            )
            .await
            .unwrap_or_default();
        let prefix = rt
            .get_option("prefix", Some(&obs.id), OptionScope::Local, OptionTarget::Session)
            .await
            .unwrap_or_default();
        let prefix2 = rt
            .get_option(
                "prefix2",
                Some(&obs.id),
                OptionScope::Local,
                OptionTarget::Session,
            )
            .await
            .unwrap_or_default();
        if let Some(session) = model.sessions.get_mut(&obs.id) {
            session.statusbar =
                StatusBar::from_options(local_status.trim(), local_position.trim(), default_bar);
            let prefix = prefix.trim();
            let prefix2 = prefix2.trim();
            session.prefix = (!prefix.is_empty()).then(|| prefix.to_string());
            session.prefix2 = (!prefix2.is_empty()).then(|| prefix2.to_string());
        }
    }

    closures.extend(windows_reload(model, rt).await?);
    closures.extend(clients_reload(model, rt).await?);

    if model.is_empty_of_sessions() {
        rt.launch_cc(None).await?;
    }

    Ok(closures)
}

/// Whether a session snapshot/name is the internal temp session (used by
/// the closure dispatcher to suppress the corresponding host callback).
pub fn is_temp_session_name(name: &str) -> bool {
    name == TEMP_SESSION_NAME
}
