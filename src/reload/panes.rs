//! Panes reload (§4.8 "Panes reload").

use std::collections::HashSet;

use crate::control::layout::parse_layout;
use crate::error::{Error, Result};
use crate::model::{Model, Pane};
use crate::refresh::{Closure, ClosureQueue};

use super::Runtime;

struct ObservedPane {
    pane_id: String,
    window_id: String,
    active: bool,
    pid: i32,
    in_mode: bool,
}

fn parse_pane_line(line: &str) -> Result<ObservedPane> {
    let mut parts = line.splitn(5, ' ');
    let pane_id = parts
        .next()
        .ok_or_else(|| Error::Invalid(format!("panes reload: malformed line {line:?}")))?;
    let window_id = parts
        .next()
        .ok_or_else(|| Error::Invalid(format!("panes reload: malformed line {line:?}")))?;
    let active = parts
        .next()
        .ok_or_else(|| Error::Invalid(format!("panes reload: malformed line {line:?}")))?;
    let pid = parts
        .next()
        .ok_or_else(|| Error::Invalid(format!("panes reload: malformed line {line:?}")))?;
    let in_mode = parts
        .next()
        .ok_or_else(|| Error::Invalid(format!("panes reload: malformed line {line:?}")))?;
    Ok(ObservedPane {
        pane_id: pane_id.to_string(),
        window_id: window_id.to_string(),
        active: active == "1",
        pid: pid
            .parse()
            .map_err(|_| Error::Invalid(format!("panes reload: bad pid in {line:?}")))?,
        in_mode: in_mode == "1",
    })
}

pub async fn panes_reload(model: &mut Model, rt: &mut impl Runtime) -> Result<ClosureQueue> {
    let mut closures = ClosureQueue::new();

    let lines = rt
        .list(&[
            "list-panes".into(),
            "-aF".into(),
            "#{pane_id} #{window_id} #{pane_active} #{pane_pid} #{pane_in_mode}".into(),
        ])
        .await?;

    let mut observed = Vec::with_capacity(lines.len());
    for line in &lines {
        observed.push(parse_pane_line(line)?);
    }

    // Diff pattern step 1/2: anything currently shadowed but not observed
    // again is closed.
    let observed_ids: HashSet<&str> = observed.iter().map(|o| o.pane_id.as_str()).collect();
    let existing_ids: Vec<String> = model.panes.keys().cloned().collect();
    for id in existing_ids {
        if !observed_ids.contains(id.as_str()) {
            if let Some(pane) = model.panes.remove(&id) {
                model.unlink_pane(&pane.window, &pane.id);
                closures.add(Closure::PaneClosed(pane.snapshot()));
            }
        }
    }

    // Diff pattern step 3: anything observed but not yet shadowed is new.
    // A per-pane "seen in this pass" set handles window linking, where the
    // same window can legitimately repeat across rows.
    let mut seen_this_pass: HashSet<String> = HashSet::new();
    for obs in &observed {
        if seen_this_pass.contains(&obs.pane_id) {
            continue;
        }
        seen_this_pass.insert(obs.pane_id.clone());

        if !model.panes.contains_key(&obs.pane_id) {
            let pane = Pane {
                id: obs.pane_id.clone(),
                window: obs.window_id.clone(),
                pid: obs.pid,
                active: obs.active,
                in_mode: obs.in_mode,
                x: 0,
                y: 0,
                w: 0,
                h: 0,
            };
            model.link_pane_to_window(&obs.window_id, &pane.id);
            closures.add(Closure::NewPane(pane.snapshot()));
            model.panes.insert(pane.id.clone(), pane);
        } else if let Some(pane) = model.panes.get_mut(&obs.pane_id) {
            pane.active = obs.active;
            pane.pid = obs.pid;
            if pane.window != obs.window_id {
                model.unlink_pane(&pane.window.clone(), &obs.pane_id);
                pane.window = obs.window_id.clone();
                model.link_pane_to_window(&obs.window_id, &obs.pane_id);
            }
            if pane.in_mode != obs.in_mode {
                pane.in_mode = obs.in_mode;
                closures.add(Closure::PaneModeChanged(pane.snapshot()));
            }
        }
    }

    // Rebuild each window's active-pane pointer; emit WindowPaneChanged on
    // real change.
    let mut active_by_window: std::collections::HashMap<String, String> =
        std::collections::HashMap::new();
    for obs in &observed {
        if obs.active {
            active_by_window.insert(obs.window_id.clone(), obs.pane_id.clone());
        }
    }
    for (window_id, active_pane) in &active_by_window {
        if let Some(window) = model.windows.get_mut(window_id) {
            if window.active_pane.as_deref() != Some(active_pane.as_str()) {
                window.active_pane = Some(active_pane.clone());
                closures.add(Closure::WindowPaneChanged(window.snapshot()));
            }
        }
    }

    // Layout pass: refresh geometry, emitting Resized only on real change.
    let layout_lines = rt
        .list(&[
            "list-windows".into(),
            "-aF".into(),
            "#{window_id} #{window_visible_layout}".into(),
        ])
        .await?;

    for line in &layout_lines {
        let Some((_window_id, layout)) = line.split_once(' ') else {
            continue;
        };
        parse_layout(layout, |leaf| {
            let pane_id = format!("%{}", leaf.pane_id);
            if let Some(pane) = model.panes.get_mut(&pane_id) {
                let before = pane.geometry();
                let after = (leaf.x, leaf.y, leaf.w, leaf.h);
                if before != after {
                    pane.x = leaf.x;
                    pane.y = leaf.y;
                    pane.w = leaf.w;
                    pane.h = leaf.h;
                    closures.add(Closure::PaneResized(pane.snapshot()));
                }
            }
        })?;
    }

    Ok(closures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Window;
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
    async fn new_pane_then_resized_ordering() {
        let mut model = Model::new();
        model.windows.insert("@1".into(), Window::new("@1".into()));
        let mut rt = FakeRuntime {
            responses: vec![
                vec!["%1 @1 1 111 0".to_string()],
                vec!["@1 chk,80x24,0,0,1".to_string()],
            ]
            .into(),
        };
        let closures = panes_reload(&mut model, &mut rt).await.unwrap().drain();
        assert!(matches!(closures[0], Closure::NewPane(_)));
        assert!(matches!(closures.last(), Some(Closure::PaneResized(_))));
    }

    #[tokio::test]
    async fn closes_panes_no_longer_observed() {
        let mut model = Model::new();
        model.windows.insert("@1".into(), Window::new("@1".into()));
        model.panes.insert(
            "%9".into(),
            Pane {
                id: "%9".into(),
                window: "@1".into(),
                pid: 1,
                active: true,
                in_mode: false,
                x: 0,
                y: 0,
                w: 80,
                h: 24,
            },
        );
        model.link_pane_to_window(&"@1".to_string(), &"%9".to_string());
        let mut rt = FakeRuntime {
            responses: vec![vec![], vec![]].into(),
        };
        let closures = panes_reload(&mut model, &mut rt).await.unwrap().drain();
        assert!(matches!(closures[0], Closure::PaneClosed(_)));
        assert!(!model.panes.contains_key("%9"));
    }

    #[tokio::test]
    async fn no_change_emits_zero_closures() {
        let mut model = Model::new();
        model.windows.insert("@1".into(), Window::new("@1".into()));
        model.panes.insert(
            "%1".into(),
            Pane {
                id: "%1".into(),
                window: "@1".into(),
                pid: 111,
                active: true,
                in_mode: false,
                x: 0,
                y: 0,
                w: 80,
                h: 24,
            },
        );
        model.link_pane_to_window(&"@1".to_string(), &"%1".to_string());
        model.windows.get_mut("@1").unwrap().active_pane = Some("%1".into());
        let mut rt = FakeRuntime {
            responses: vec![
                vec!["%1 @1 1 111 0".to_string()],
                vec!["@1 chk,80x24,0,0,1".to_string()],
            ]
            .into(),
        };
        let closures = panes_reload(&mut model, &mut rt).await.unwrap().drain();
        assert!(closures.is_empty());
    }

    #[tokio::test]
    async fn entering_copy_mode_fires_pane_mode_changed() {
        let mut model = Model::new();
        model.windows.insert("@1".into(), Window::new("@1".into()));
        model.panes.insert(
            "%1".into(),
            Pane {
                id: "%1".into(),
                window: "@1".into(),
                pid: 111,
                active: true,
                in_mode: false,
                x: 0,
                y: 0,
                w: 80,
                h: 24,
            },
        );
        model.link_pane_to_window(&"@1".to_string(), &"%1".to_string());
        let mut rt = FakeRuntime {
            responses: vec![
                vec!["%1 @1 1 111 1".to_string()],
                vec!["@1 chk,80x24,0,0,1".to_string()],
            ]
            .into(),
        };
        let closures = panes_reload(&mut model, &mut rt).await.unwrap().drain();
        assert!(closures
            .iter()
            .any(|c| matches!(c, Closure::PaneModeChanged(p) if p.in_mode)));
        assert!(model.panes["%1"].in_mode);
    }
}
