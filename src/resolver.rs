//! Template references into the environment snapshot.
//!
//! Run-command templates may refer to snapshot values:
//!
//! - `{<InstName>.<Field>}`, e.g. `{eserv.HostName}` → `esrvmain.ec2.amazon.com`
//! - `{<InstName>.<AppUID>.<Field>}`, e.g. `{eserv.echosrv.UPort}` → `8200`
//!
//! Templates are split on single spaces. A token holding a reference is
//! replaced as a whole by the value of its first reference. Field names are
//! the snapshot's JSON names. Anything that does not resolve becomes the empty
//! string; resolution never fails.

use regex::Regex;
use std::sync::LazyLock;
use tgo_common::{App, EnvSnapshot, Instance};

static REFERENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]+\}").unwrap());

type Accessor<T> = fn(&T) -> String;

const INSTANCE_FIELDS: &[(&str, Accessor<Instance>)] = &[
    ("InstName", |i: &Instance| i.inst_name.clone()),
    ("OS", |i: &Instance| i.os.clone()),
    ("HostName", |i: &Instance| i.host_name.clone()),
];

const APP_FIELDS: &[(&str, Accessor<App>)] = &[
    ("UID", |a: &App| a.uid.clone()),
    ("Name", |a: &App| a.name.clone()),
    ("Repo", |a: &App| a.repo.clone()),
    ("UPort", |a: &App| a.port.to_string()),
    ("IsTest", |a: &App| a.is_test.to_string()),
    ("RunCmd", |a: &App| a.run_cmd.clone()),
];

fn lookup<T>(table: &[(&str, Accessor<T>)], target: &T, field: &str) -> Option<String> {
    table
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, get)| get(target))
}

/// Expands snapshot references in command templates.
pub struct Resolver<'a> {
    env: &'a EnvSnapshot,
}

impl<'a> Resolver<'a> {
    pub fn new(env: &'a EnvSnapshot) -> Self {
        Self { env }
    }

    /// Expand `template` token by token. Tokens without a reference are kept.
    pub fn resolve(&self, template: &str) -> String {
        template
            .split(' ')
            .map(|token| match REFERENCE_REGEX.find(token) {
                Some(m) => {
                    let path = m.as_str().trim_matches(|c| c == '{' || c == '}');
                    self.reference(path).unwrap_or_default()
                }
                None => token.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Value of a single dotted reference, without braces.
    pub fn reference(&self, path: &str) -> Option<String> {
        let parts: Vec<&str> = path.split('.').collect();
        match parts.as_slice() {
            [inst, field] => {
                let inst = self.env.instance_named(inst)?;
                lookup(INSTANCE_FIELDS, inst, field)
            }
            [inst, uid, field] => {
                let app = self.env.instance_named(inst)?.app_by_uid(uid)?;
                lookup(APP_FIELDS, app, field)
            }
            _ => None,
        }
    }
}
