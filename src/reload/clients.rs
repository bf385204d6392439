//! Clients reload (§4.8 "Clients reload"). Unlike the other three entity
//! families, the host callback table (§6) has no `new_client`/
//! `client_closed` pair — only `client_session_changed` — so this
//! procedure updates the shadow collection without emitting New/Closed
//! closures for clients themselves.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::model::{Client, Model};
use crate::refresh::{Closure, ClosureQueue};

use super::Runtime;

struct ObservedClient {
    session_id: String,
    pid: i32,
    name: String,
}

fn parse_client_line(line: &str) -> Result<ObservedClient> {
    // "#{session_id} #{client_pid} |#{client_name}" — the `|` marks the
    // start of the (possibly space-containing) name field.
    let (head, name) = line
        .split_once('|')
        .ok_or_else(|| Error::Invalid(format!("clients reload: malformed line {line:?}")))?;
    let mut parts = head.split_whitespace();
    let session_id = parts
        .next()
        .ok_or_else(|| Error::Invalid(format!("clients reload: malformed line {line:?}")))?;
    let pid = parts
        .next()
        .ok_or_else(|| Error::Invalid(format!("clients reload: malformed line {line:?}")))?;
    Ok(ObservedClient {
        session_id: session_id.to_string(),
        pid: pid
            .parse()
            .map_err(|_| Error::Invalid(format!("clients reload: bad pid in {line:?}")))?,
        name: name.to_string(),
    })
}

pub async fn clients_reload(model: &mut Model, rt: &mut impl Runtime) -> Result<ClosureQueue> {
    let mut closures = ClosureQueue::new();

    let lines = rt
        .list(&[
            "list-clients".into(),
            "-F".into(),
            "#{session_id} #{client_pid} |#{client_name}".into(),
        ])
        .await?;

    let mut observed = Vec::with_capacity(lines.len());
    for line in &lines {
        observed.push(parse_client_line(line)?);
    }

    let observed_names: HashSet<&str> = observed.iter().map(|o| o.name.as_str()).collect();
    let existing_names: Vec<String> = model.clients.keys().cloned().collect();
    for name in existing_names {
        if !observed_names.contains(name.as_str()) {
            model.clients.remove(&name);
        }
    }

    for obs in &observed {
        match model.clients.get_mut(&obs.name) {
            Some(client) => {
                if client.session != obs.session_id {
                    client.session = obs.session_id.clone();
                    client.pid = obs.pid;
                    closures.add(Closure::ClientSessionChanged(client.snapshot()));
                }
            }
            None => {
                let client = Client {
                    name: obs.name.clone(),
                    pid: obs.pid,
                    session: obs.session_id.clone(),
                };
                model.clients.insert(client.name.clone(), client);
            }
        }
    }

    Ok(closures)
}

#[cfg(test)]
mod tests {
    use super::*;
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
    async fn session_change_fires_client_session_changed() {
        let mut model = Model::new();
        model.clients.insert(
            "tty0".into(),
            Client {
                name: "tty0".into(),
                pid: 1,
                session: "$0".into(),
            },
        );
        let mut rt = FakeRuntime {
            responses: vec![vec!["$1 1 |tty0".to_string()]].into(),
        };
        let closures = clients_reload(&mut model, &mut rt).await.unwrap().drain();
        assert_eq!(closures.len(), 1);
        assert!(matches!(closures[0], Closure::ClientSessionChanged(_)));
        assert_eq!(model.clients["tty0"].session, "$1");
    }

    #[tokio::test]
    async fn vanished_client_is_removed_without_a_closure() {
        let mut model = Model::new();
        model.clients.insert(
            "tty0".into(),
            Client {
                name: "tty0".into(),
                pid: 1,
                session: "$0".into(),
            },
        );
        let mut rt = FakeRuntime {
            responses: vec![vec![]].into(),
        };
        let closures = clients_reload(&mut model, &mut rt).await.unwrap().drain();
        assert!(closures.is_empty());
        assert!(!model.clients.contains_key("tty0"));
    }
}
