//! The console's route table. Access rules live here as data and nowhere
//! else; the guard and the navigation menu both read this table.

use crate::console::types::Role;

pub const LOGIN: &str = "/login";
pub const REGISTER: &str = "/register";
/// Default authenticated landing route.
pub const LANDING: &str = "/dashboard";

const MANAGEMENT: &[Role] = &[Role::Admin, Role::Manager];
const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// A protected route and the roles allowed to open it.
#[derive(Debug, PartialEq, Eq)]
pub struct RouteAccessRule {
    pub path: &'static str,
    pub label: &'static str,
    /// `None` admits any authenticated identity.
    pub allowed_roles: Option<&'static [Role]>,
    /// Service endpoint backing the screen, if it loads a listing.
    pub endpoint: Option<&'static str>,
}

impl RouteAccessRule {
    #[must_use]
    pub fn admits(&self, role: Role) -> bool {
        self.allowed_roles
            .map_or(true, |roles| roles.contains(&role))
    }
}

pub static PROTECTED_ROUTES: &[RouteAccessRule] = &[
    RouteAccessRule {
        path: LANDING,
        label: "Dashboard",
        allowed_roles: None,
        endpoint: None,
    },
    RouteAccessRule {
        path: "/stocks",
        label: "Stocks",
        allowed_roles: Some(MANAGEMENT),
        endpoint: Some("/stocks"),
    },
    RouteAccessRule {
        path: "/suppliers",
        label: "Suppliers",
        allowed_roles: Some(MANAGEMENT),
        endpoint: Some("/suppliers"),
    },
    RouteAccessRule {
        path: "/purchases",
        label: "Purchases",
        allowed_roles: Some(MANAGEMENT),
        endpoint: Some("/purchases"),
    },
    RouteAccessRule {
        path: "/usage",
        label: "Usage",
        allowed_roles: None,
        endpoint: Some("/usages"),
    },
    RouteAccessRule {
        path: "/expenses",
        label: "Expenses",
        allowed_roles: Some(MANAGEMENT),
        endpoint: Some("/expenses"),
    },
    RouteAccessRule {
        path: "/reports",
        label: "Reports",
        allowed_roles: None,
        endpoint: Some("/reports/monthly"),
    },
    RouteAccessRule {
        path: "/users",
        label: "Users",
        allowed_roles: Some(ADMIN_ONLY),
        endpoint: Some("/users"),
    },
];

/// Finds the rule for a location; query, fragment and trailing slashes are ignored.
#[must_use]
pub fn find(location: &str) -> Option<&'static RouteAccessRule> {
    let path = path_of(location);
    PROTECTED_ROUTES.iter().find(|rule| rule.path == path)
}

/// Routes a role may open, in menu order.
pub fn navigation_for(role: Role) -> impl Iterator<Item = &'static RouteAccessRule> {
    PROTECTED_ROUTES.iter().filter(move |rule| rule.admits(role))
}

/// The path component of a location: no query, no fragment, no trailing slash.
#[must_use]
pub fn path_of(location: &str) -> &str {
    let location = location.trim();
    let end = location.find(['?', '#']).unwrap_or(location.len());
    let path = location.get(..end).unwrap_or(location).trim_end_matches('/');
    if path.is_empty() { "/" } else { path }
}

/// The query string of a location, without the leading `?`.
#[must_use]
pub fn query_of(location: &str) -> Option<&str> {
    let (_, rest) = location.trim().split_once('?')?;
    let query = rest.split('#').next().unwrap_or_default();
    (!query.is_empty()).then_some(query)
}
