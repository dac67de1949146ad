//! Route guard. `evaluate` gates one protected route; `resolve` is the
//! top-level rule that also covers the public routes and unknown locations,
//! so no location reaches content without passing the role check.
//!
//! UX-only gate: real access control must live on the API.

use crate::console::{
    context::SessionState,
    routes::{self, LANDING, LOGIN, REGISTER, RouteAccessRule},
};

/// Outcome of guarding one protected route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session still hydrating; show a neutral indicator, decide nothing.
    Waiting,
    /// No session; `from` is restored after a successful login.
    RedirectToLogin { from: String },
    /// Signed in but the role is not on the allow-list.
    RedirectToLanding,
    Render,
}

/// Evaluates, in order: loading, missing session, role allow-list.
#[must_use]
pub fn evaluate(state: &SessionState, rule: &RouteAccessRule, requested: &str) -> GuardDecision {
    match state {
        SessionState::Initializing => GuardDecision::Waiting,
        SessionState::Unauthenticated => GuardDecision::RedirectToLogin {
            from: requested.trim().to_string(),
        },
        SessionState::Authenticated(user) if !rule.admits(user.role) => {
            GuardDecision::RedirectToLanding
        }
        SessionState::Authenticated(_) => GuardDecision::Render,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublicPage {
    Login,
    Register,
}

/// Outcome of the top-level routing rule for any location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Waiting,
    Redirect {
        to: &'static str,
        from: Option<String>,
    },
    Public(PublicPage),
    Render(&'static RouteAccessRule),
}

/// Resolves any location against the route table and the session state.
#[must_use]
pub fn resolve(state: &SessionState, location: &str) -> Resolution {
    if state.is_loading() {
        return Resolution::Waiting;
    }

    let path = routes::path_of(location);
    let public = match path {
        LOGIN => Some(PublicPage::Login),
        REGISTER => Some(PublicPage::Register),
        _ => None,
    };

    if let Some(page) = public {
        return if state.is_authenticated() {
            Resolution::Redirect {
                to: LANDING,
                from: None,
            }
        } else {
            Resolution::Public(page)
        };
    }

    let Some(rule) = routes::find(path) else {
        // unknown locations (including `/`) never render anything
        let to = if state.is_authenticated() { LANDING } else { LOGIN };
        return Resolution::Redirect { to, from: None };
    };

    match evaluate(state, rule, location) {
        GuardDecision::Waiting => Resolution::Waiting,
        GuardDecision::RedirectToLogin { from } => Resolution::Redirect {
            to: LOGIN,
            from: Some(from),
        },
        GuardDecision::RedirectToLanding => Resolution::Redirect {
            to: LANDING,
            from: None,
        },
        GuardDecision::Render => Resolution::Render(rule),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{
        routes::PROTECTED_ROUTES,
        types::{Role, UserInfo},
    };

    fn signed_in(role: Role) -> SessionState {
        SessionState::Authenticated(UserInfo {
            username: "alice".to_string(),
            role,
        })
    }

    fn all_states() -> Vec<SessionState> {
        let mut states = vec![SessionState::Initializing, SessionState::Unauthenticated];
        states.extend(Role::ALL.into_iter().map(signed_in));
        states
    }

    #[test]
    fn never_renders_while_loading() {
        for rule in PROTECTED_ROUTES {
            assert_eq!(
                evaluate(&SessionState::Initializing, rule, rule.path),
                GuardDecision::Waiting
            );
            assert_eq!(
                resolve(&SessionState::Initializing, rule.path),
                Resolution::Waiting
            );
        }
        assert_eq!(
            resolve(&SessionState::Initializing, "/nowhere"),
            Resolution::Waiting
        );
    }

    #[test]
    fn never_renders_for_a_role_outside_the_allow_list() {
        for state in all_states() {
            for rule in PROTECTED_ROUTES {
                let rendered = matches!(resolve(&state, rule.path), Resolution::Render(_));
                let admitted = state.user().is_some_and(|user| rule.admits(user.role));
                assert_eq!(rendered, admitted, "{state:?} on {}", rule.path);
            }
        }
    }

    #[test]
    fn staff_on_management_route_goes_to_landing() {
        let stocks = routes::find("/stocks").unwrap();
        assert_eq!(
            evaluate(&signed_in(Role::Staff), stocks, "/stocks"),
            GuardDecision::RedirectToLanding
        );
        assert_eq!(
            resolve(&signed_in(Role::Staff), "/stocks"),
            Resolution::Redirect {
                to: LANDING,
                from: None
            }
        );
    }

    #[test]
    fn unauthenticated_goes_to_login_carrying_location() {
        assert_eq!(
            resolve(&SessionState::Unauthenticated, "/reports?month=2024-05"),
            Resolution::Redirect {
                to: LOGIN,
                from: Some("/reports?month=2024-05".to_string())
            }
        );
    }

    #[test]
    fn public_routes() {
        assert_eq!(
            resolve(&SessionState::Unauthenticated, "/login"),
            Resolution::Public(PublicPage::Login)
        );
        assert_eq!(
            resolve(&SessionState::Unauthenticated, "/register/"),
            Resolution::Public(PublicPage::Register)
        );
        for role in Role::ALL {
            for path in [LOGIN, REGISTER] {
                assert_eq!(
                    resolve(&signed_in(role), path),
                    Resolution::Redirect {
                        to: LANDING,
                        from: None
                    }
                );
            }
        }
    }

    #[test]
    fn unknown_locations_redirect() {
        for path in ["/", "/nowhere", "/stocks/1", "/admin"] {
            assert_eq!(
                resolve(&SessionState::Unauthenticated, path),
                Resolution::Redirect {
                    to: LOGIN,
                    from: None
                }
            );
            assert_eq!(
                resolve(&signed_in(Role::Manager), path),
                Resolution::Redirect {
                    to: LANDING,
                    from: None
                }
            );
        }
    }

    #[test]
    fn admitted_role_renders() {
        assert_eq!(
            resolve(&signed_in(Role::Admin), "/users"),
            Resolution::Render(routes::find("/users").unwrap())
        );
        assert_eq!(
            resolve(&signed_in(Role::Staff), "/usage"),
            Resolution::Render(routes::find("/usage").unwrap())
        );
    }
}
