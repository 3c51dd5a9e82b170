//! Page catalog and HTML rendering.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every routable page has a `Page` entry with its title and layout. Page
//! bodies are loaded on first render: an operator-supplied fragment at
//! `SITE_DIR/pages/<slug>.html` wins, otherwise a built-in body is used. The
//! loaded body is cached for the life of the process.
//!
//! Two layouts exist: the public site chrome and the admin sidebar chrome.
//! Navigation is personalized from the session snapshot and rendered with
//! Leptos on the server.

use std::path::{Path, PathBuf};

use leptos::prelude::*;
use tokio::sync::OnceCell;

use crate::services::auth_store::SessionSnapshot;
use crate::services::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Public,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    Home,
    Portfolio,
    Offers,
    Reviews,
    Blog,
    Contact,
    Login,
    Register,
    Account,
    AdminLogin,
    AdminDashboard,
    AdminPortfolio,
    AdminTeam,
    AdminFeedback,
    AdminContacts,
    NotFound,
    Loading,
}

const PAGE_COUNT: usize = 17;

impl Page {
    #[cfg(test)]
    pub const ALL: [Self; PAGE_COUNT] = [
        Self::Home,
        Self::Portfolio,
        Self::Offers,
        Self::Reviews,
        Self::Blog,
        Self::Contact,
        Self::Login,
        Self::Register,
        Self::Account,
        Self::AdminLogin,
        Self::AdminDashboard,
        Self::AdminPortfolio,
        Self::AdminTeam,
        Self::AdminFeedback,
        Self::AdminContacts,
        Self::NotFound,
        Self::Loading,
    ];

    fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Portfolio => "portfolio",
            Self::Offers => "offers",
            Self::Reviews => "reviews",
            Self::Blog => "blog",
            Self::Contact => "contact",
            Self::Login => "login",
            Self::Register => "register",
            Self::Account => "account",
            Self::AdminLogin => "admin-login",
            Self::AdminDashboard => "admin-dashboard",
            Self::AdminPortfolio => "admin-portfolio",
            Self::AdminTeam => "admin-team",
            Self::AdminFeedback => "admin-feedback",
            Self::AdminContacts => "admin-contacts",
            Self::NotFound => "not-found",
            Self::Loading => "loading",
        }
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Home => "Home",
            Self::Portfolio => "Portfolio",
            Self::Offers => "Offers",
            Self::Reviews => "Reviews",
            Self::Blog => "Blog",
            Self::Contact => "Contact",
            Self::Login => "Log in",
            Self::Register => "Create an account",
            Self::Account => "Your account",
            Self::AdminLogin => "Admin login",
            Self::AdminDashboard => "Dashboard",
            Self::AdminPortfolio => "Portfolio content",
            Self::AdminTeam => "Team members",
            Self::AdminFeedback => "Feedback",
            Self::AdminContacts => "Contacts",
            Self::NotFound => "Page not found",
            Self::Loading => "Loading",
        }
    }

    /// Admin login is deliberately in the public chrome: its visitors are not
    /// admins yet.
    #[must_use]
    pub fn layout(self) -> Layout {
        match self {
            Self::AdminDashboard | Self::AdminPortfolio | Self::AdminTeam | Self::AdminFeedback | Self::AdminContacts => {
                Layout::Admin
            }
            _ => Layout::Public,
        }
    }

    fn builtin_body(self) -> &'static str {
        match self {
            Self::Home => {
                r#"<section class="hero"><p>Weddings, portraits and events, photographed with patience and an eye for light.</p><a class="button" href="/portfolio">See the work</a></section>"#
            }
            Self::Portfolio => r#"<section class="gallery" data-endpoint="/api/portfolio"><p>Selected work from recent sessions.</p></section>"#,
            Self::Offers => r#"<section class="offers" data-endpoint="/api/offers"><p>Packages for weddings, portraits and commercial shoots.</p></section>"#,
            Self::Reviews => r#"<section class="reviews" data-endpoint="/api/feedback"><p>What clients say about working with us.</p></section>"#,
            Self::Blog => r#"<section class="blog" data-endpoint="/api/blog"><p>Stories from behind the camera.</p></section>"#,
            Self::Contact => {
                r#"<section class="contact" data-endpoint="/api/contacts"><p>Tell us about your event and we will get back to you within two days.</p></section>"#
            }
            Self::Login | Self::Register | Self::AdminLogin => "",
            Self::Account => r#"<p>Manage your bookings and details.</p>"#,
            Self::AdminDashboard => r#"<p>Overview of recent enquiries, feedback and portfolio updates.</p>"#,
            Self::AdminPortfolio => r#"<section data-endpoint="/api/portfolio" data-editable="true"></section>"#,
            Self::AdminTeam => r#"<section data-endpoint="/api/team" data-editable="true"></section>"#,
            Self::AdminFeedback => r#"<section data-endpoint="/api/feedback" data-editable="true"></section>"#,
            Self::AdminContacts => r#"<section data-endpoint="/api/contacts" data-editable="true"></section>"#,
            Self::NotFound => r#"<p>The page you were looking for does not exist. <a href="/">Back to the home page</a>.</p>"#,
            Self::Loading => r#"<p class="loading" aria-busy="true">Checking your session…</p>"#,
        }
    }
}

// =============================================================================
// CATALOG
// =============================================================================

pub struct PageCatalog {
    dir: PathBuf,
    bodies: [OnceCell<String>; PAGE_COUNT],
}

impl PageCatalog {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, bodies: std::array::from_fn(|_| OnceCell::new()) }
    }

    /// Body fragment for `page`, loading it on first use.
    pub async fn body(&self, page: Page) -> &str {
        self.bodies[page.index()]
            .get_or_init(|| load_body(&self.dir, page))
            .await
            .as_str()
    }

    #[cfg(test)]
    pub fn is_loaded(&self, page: Page) -> bool {
        self.bodies[page.index()].initialized()
    }
}

async fn load_body(dir: &Path, page: Page) -> String {
    let path = dir.join(format!("{}.html", page.slug()));
    match tokio::fs::read_to_string(&path).await {
        Ok(body) => {
            tracing::debug!(page = page.slug(), path = %path.display(), "loaded page override");
            body
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => page.builtin_body().to_owned(),
        Err(e) => {
            tracing::warn!(page = page.slug(), error = %e, "failed to read page override");
            page.builtin_body().to_owned()
        }
    }
}

// =============================================================================
// RENDERING
// =============================================================================
//
// Chrome, navigation and forms are Leptos views rendered to strings, so every
// value that came from a user is escaped by the renderer. Page bodies are
// operator-controlled fragments and go in verbatim through `inner_html`.

const PUBLIC_BRAND: &str = "Manish Photography";
const ADMIN_BRAND: &str = "Studio Admin";

/// Wrap `body` in the page's layout.
pub fn render(page: Page, session: &SessionSnapshot, body: &str) -> String {
    let body = body.to_owned();
    let chrome = match page.layout() {
        Layout::Public => {
            let nav = public_nav(session.user.clone());
            view! {
                <header class="site-header">
                    <a class="brand" href="/">{PUBLIC_BRAND}</a>
                    <nav>{nav}</nav>
                </header>
            }
            .into_any()
        }
        Layout::Admin => view! {
            <aside class="admin-sidebar">
                <a class="brand" href="/admin">{ADMIN_BRAND}</a>
                <nav>{admin_nav()}</nav>
            </aside>
        }
        .into_any(),
    };
    let footer = (page.layout() == Layout::Public).then(|| {
        view! {
            <footer class="site-footer">
                <a href="/contact">"Get in touch"</a>
            </footer>
        }
    });

    view! {
        <Document page>
            {chrome}
            <main>
                <h1>{page.title()}</h1>
                <div class="page-body" inner_html=body></div>
            </main>
            {footer}
        </Document>
    }
    .to_html()
}

#[component]
fn Document(page: Page, children: Children) -> impl IntoView {
    let (brand, layout) = match page.layout() {
        Layout::Public => (PUBLIC_BRAND, "public"),
        Layout::Admin => (ADMIN_BRAND, "admin"),
    };
    let title = format!("{} | {brand}", page.title());
    let body_class = format!("layout-{layout} page-{}", page.slug());
    let noindex = (page.layout() == Layout::Admin).then(|| view! { <meta name="robots" content="noindex"/> });

    view! {
        <!DOCTYPE html>
        <html lang="en">
            <head>
                <meta charset="utf-8"/>
                <meta name="viewport" content="width=device-width, initial-scale=1"/>
                {noindex}
                <title>{title}</title>
                <link rel="stylesheet" href="/assets/site.css"/>
            </head>
            <body class=body_class>{children()}</body>
        </html>
    }
}

fn logout_form() -> impl IntoView {
    view! {
        <form class="inline-form" method="post" action="/logout">
            <button type="submit">"Log out"</button>
        </form>
    }
}

fn public_nav(user: Option<User>) -> impl IntoView {
    let account = match user {
        Some(user) => {
            let admin_link = user.is_admin().then(|| view! { <a class="admin-link" href="/admin">"Admin"</a> });
            view! {
                {admin_link}
                <a href="/account">{user.first_name}</a>
                {logout_form()}
            }
            .into_any()
        }
        None => view! { <a href="/login">"Log in"</a> }.into_any(),
    };

    view! {
        <a href="/">"Home"</a>
        <a href="/portfolio">"Portfolio"</a>
        <a href="/offers">"Offers"</a>
        <a href="/reviews">"Reviews"</a>
        <a href="/blog">"Blog"</a>
        <a href="/contact">"Contact"</a>
        {account}
    }
}

fn admin_nav() -> impl IntoView {
    view! {
        <a href="/admin">"Dashboard"</a>
        <a href="/admin/portfolio">"Portfolio"</a>
        <a href="/admin/team">"Team"</a>
        <a href="/admin/feedback">"Feedback"</a>
        <a href="/admin/contacts">"Contacts"</a>
        <a href="/">"View site"</a>
        {logout_form()}
    }
}

fn error_banner(error: Option<String>) -> impl IntoView {
    error.map(|e| view! { <p class="form-error" role="alert">{e}</p> })
}

/// Email/password form posting to `action`, as an HTML fragment.
pub fn login_form(action: &'static str, error: Option<&str>, email: &str) -> String {
    let error = error.map(str::to_owned);
    let email = email.to_owned();
    let register_link = (action == "/login").then(|| {
        view! {
            <p>"New here? " <a href="/register">"Create an account"</a> "."</p>
        }
    });

    view! {
        {error_banner(error)}
        <form method="post" action=action>
            <label>"Email " <input type="email" name="email" value=email required=true/></label>
            <label>"Password " <input type="password" name="password" required=true/></label>
            <button type="submit">"Log in"</button>
        </form>
        {register_link}
    }
    .to_html()
}

/// Values echoed back into the registration form after a failed attempt.
#[derive(Debug, Default, Clone)]
pub struct RegisterValues<'a> {
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone_number: &'a str,
}

pub fn register_form(error: Option<&str>, values: &RegisterValues<'_>) -> String {
    let error = error.map(str::to_owned);
    let first_name = values.first_name.to_owned();
    let last_name = values.last_name.to_owned();
    let email = values.email.to_owned();
    let phone_number = values.phone_number.to_owned();

    view! {
        {error_banner(error)}
        <form method="post" action="/register">
            <label>"First name " <input name="firstName" value=first_name required=true/></label>
            <label>"Last name " <input name="lastName" value=last_name required=true/></label>
            <label>"Email " <input type="email" name="email" value=email required=true/></label>
            <label>"Phone " <input type="tel" name="phoneNumber" value=phone_number/></label>
            <label>"Password " <input type="password" name="password" minlength="6" required=true/></label>
            <button type="submit">"Create account"</button>
        </form>
        <p>"Already registered? " <a href="/login">"Log in"</a> "."</p>
    }
    .to_html()
}

pub fn account_details(user: &User) -> String {
    let name = user.display_name();
    let email = user.email.clone();
    let phone = user.phone_number.clone().unwrap_or_else(|| "not provided".to_owned());
    let since = user.created_at.date().to_string();

    view! {
        <dl class="account">
            <dt>"Name"</dt>
            <dd>{name}</dd>
            <dt>"Email"</dt>
            <dd>{email}</dd>
            <dt>"Phone"</dt>
            <dd>{phone}</dd>
            <dt>"Member since"</dt>
            <dd>{since}</dd>
        </dl>
    }
    .to_html()
}

#[cfg(test)]
#[path = "pages_test.rs"]
mod tests;
