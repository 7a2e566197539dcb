// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use lazy_static::lazy_static;
use minijinja::Environment;
use serde::Serialize;
use tracing::error;

use crate::view::auth::AuthSnapshot;
use crate::view::dashboard::DashboardSnapshot;

const TEMPLATES: [(&str, &str); 4] = [
    ("layout.html", include_str!("../templates/layout.html")),
    ("loading.html", include_str!("../templates/loading.html")),
    ("auth.html", include_str!("../templates/auth.html")),
    ("dashboard.html", include_str!("../templates/dashboard.html")),
];

lazy_static! {
    static ref ENV: Environment<'static> = {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            if let Err(e) = env.add_template(name, source) {
                error!("Failed to load template {}: {}", name, e);
            }
        }
        env
    };
}

fn render<S: Serialize>(name: &str, context: S) -> Result<String, minijinja::Error> {
    ENV.get_template(name)?.render(context)
}

pub fn render_loading() -> Result<String, minijinja::Error> {
    render("loading.html", minijinja::context! {})
}

pub fn render_auth(snapshot: &AuthSnapshot) -> Result<String, minijinja::Error> {
    render("auth.html", snapshot)
}

pub fn render_dashboard(snapshot: &DashboardSnapshot) -> Result<String, minijinja::Error> {
    render("dashboard.html", snapshot)
}
