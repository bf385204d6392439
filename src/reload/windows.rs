//! Windows reload (§4.8 "Windows reload").

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::model::{Model, Window};
use crate::reload::panes::panes_reload;
use crate::refresh::{Closure, ClosureQueue};

use super::Runtime;

struct ObservedWindow {
    window_id: String,
    session_id: String,
    active: bool,
}

fn parse_window_line(line: &str) -> Result<ObservedWindow> {
    let mut parts = line.splitn(3, ' ');
    let window_id = parts
        .next()
        .ok_or_else(|| Error::Invalid(format!("windows reload: malformed line {line:?}")))?;
    let session_id = parts
        .next()
        .ok_or_else(|| Error::Invalid(format!("windows reload: malformed line {line:?}")))?;
    let active = parts
        .next()
        .ok_or_else(|| Error::Invalid(format!("windows reload: malformed line {line:?}")))?;
    Ok(ObservedWindow {
        window_id: window_id.to_string(),
        session_id: session_id.to_string(),
        active: active == "1",
    })
}

pub async fn windows_reload(model: &mut Model, rt: &mut impl Runtime) -> Result<ClosureQueue> {
    let mut closures = ClosureQueue::new();

    let lines = rt
        .list(&[
            "list-windows".into(),
            "-aF".into(),
            "#{window_id} #{session_id} #{window_active}".into(),
        ])
        .await?;

    let mut observed = Vec::with_capacity(lines.len());
    for line in &lines {
        observed.push(parse_window_line(line)?);
    }

    let observed_ids: HashSet<&str> = observed.iter().map(|o| o.window_id.as_str()).collect();
    let existing_ids: Vec<String> = model.windows.keys().cloned().collect();
    for id in existing_ids {
        if !observed_ids.contains(id.as_str()) {
            if let Some(window) = model.windows.remove(&id) {
                for pane_id in window.panes.clone() {
                    model.panes.remove(&pane_id);
                }
                closures.add(Closure::WindowClosed(window.snapshot()));
            }
        }
    }

    for obs in &observed {
        model
            .windows
            .entry(obs.window_id.clone())
            .or_insert_with(|| {
                let w = Window::new(obs.window_id.clone());
                closures.add(Closure::NewWindow(w.snapshot()));
                w
            });
    }

    // Rebuild each session's window array in observed order. `Vec` grows
    // automatically (the spec's "doubling from capacity 4" describes the
    // C array this replaces; no manual growth policy needed here).
    let mut windows_by_session: std::collections::HashMap<String, Vec<String>> =
        std::collections::HashMap::new();
    let mut active_by_session: std::collections::HashMap<String, String> =
        std::collections::HashMap::new();
    for obs in &observed {
        windows_by_session
            .entry(obs.session_id.clone())
            .or_default()
            .push(obs.window_id.clone());
        if obs.active {
            active_by_session.insert(obs.session_id.clone(), obs.window_id.clone());
        }
    }

    for (session_id, windows) in windows_by_session {
        if let Some(session) = model.sessions.get_mut(&session_id) {
            session.windows = windows;
            if let Some(active) = active_by_session.get(&session_id) {
                if session.active_window.as_deref() != Some(active.as_str()) {
                    session.active_window = Some(active.clone());
                    closures.add(Closure::SessionWindowChanged(session.snapshot()));
                }
            }
        }
    }

    closures.extend(panes_reload(model, rt).await?);
    Ok(closures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Session;
    use crate::reload::options::{OptionScope, OptionTarget};

    struct FakeRuntime {
        responses: std::collections::VecDeque<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl Runtime for FakeRuntime {
        async fn list(&mut self, _args: &[String]) -> Result<Vec<String>> {
            Ok(self.responses.pop_front().unwrap_or_default())
        }
        async fn get_option(
            &mut self,
            _name: &str,
            _target: Option<&str>,
            _scope: OptionScope,
            _kind: OptionTarget,
        ) -> Result<String> {
            Ok(String::new())
        }
        async fn launch_cc(&mut self, _session: Option<String>) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn new_window_fires_session_window_changed() {
        let mut model = Model::new();
        model
            .sessions
            .insert("$0".into(), Session::new("$0".into(), "main".into()));
        let mut rt = FakeRuntime {
            responses: vec![vec!["@1 $0 1".to_string()], vec![], vec![]].into(),
        };
        let closures = windows_reload(&mut model, &mut rt).await.unwrap().drain();
        assert!(closures
            .iter()
            .any(|c| matches!(c, Closure::NewWindow(_))));
        assert!(closures
            .iter()
            .any(|c| matches!(c, Closure::SessionWindowChanged(_))));
        assert_eq!(model.sessions["$0"].windows, vec!["@1".to_string()]);
    }

    #[tokio::test]
    async fn closed_window_drops_its_panes() {
        let mut model = Model::new();
        model.windows.insert("@9".into(), Window::new("@9".into()));
        model.link_pane_to_window(&"@9".to_string(), &"%1".to_string());
        model.panes.insert(
            "%1".into(),
            crate::model::Pane {
                id: "%1".into(),
                window: "@9".into(),
                pid: 1,
                active: true,
                in_mode: false,
                x: 0,
                y: 0,
                w: 1,
                h: 1,
            },
        );
        let mut rt = FakeRuntime {
            responses: vec![vec![], vec![], vec![]].into(),
        };
        let closures = windows_reload(&mut model, &mut rt).await.unwrap().drain();
        assert!(closures
            .iter()
            .any(|c| matches!(c, Closure::WindowClosed(_))));
        assert!(!model.panes.contains_key("%1"));
    }
}
