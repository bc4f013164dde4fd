use academic_portal::{
    models::Role,
    policy::{Denial, PolicyTable},
    routes,
};
use axum::http::Method;

#[test]
fn empty_table_denies_every_role() {
    let policy = PolicyTable::new();

    for role in Role::ALL {
        assert!(matches!(
            policy.authorize(role, &Method::GET, "/me"),
            Err(Denial::PolicyUndefined { .. })
        ));
    }
}

#[test]
fn unknown_route_or_method_is_undefined_for_every_role() {
    let policy = PolicyTable::reference();
    let unknown = [
        (Method::DELETE, "/graduations/{id}"),
        (Method::GET, "/admin/accounts"),
        (Method::PATCH, "/me"),
        (Method::GET, "/students"),
        // Concrete paths are never keys; only route patterns are.
        (Method::GET, "/graduations/6f1c2a9e-0000-0000-0000-000000000000"),
    ];

    for (method, route) in unknown {
        for role in Role::ALL {
            assert_eq!(
                policy.authorize(role, &method, route),
                Err(Denial::PolicyUndefined {
                    method: method.clone(),
                    route: route.to_string(),
                }),
                "{role} {method} {route}"
            );
        }
    }
}

#[test]
fn every_entry_allows_its_roles_and_denies_the_rest() {
    let policy = PolicyTable::reference();
    assert!(!policy.is_empty());

    for (method, route, permitted) in policy.entries() {
        for role in Role::ALL {
            let outcome = policy.authorize(role, method, route);
            if permitted.contains(&role) {
                assert!(outcome.is_ok(), "{role} should reach {method} {route}");
            } else {
                assert!(
                    matches!(outcome, Err(Denial::InsufficientRole { .. })),
                    "{role} should be refused {method} {route}"
                );
            }
        }
    }
}

#[test]
fn portal_matrix_matches_the_documented_roles() {
    use Role::{Admin, Student, Teacher};
    let policy = PolicyTable::reference();

    let expected: [(Method, &str, &[Role]); 12] = [
        (Method::GET, "/me", &[Student, Teacher, Admin]),
        (Method::PUT, "/me/password", &[Student, Teacher, Admin]),
        (Method::POST, "/admin/password-reset", &[Admin]),
        (Method::POST, "/admin/accounts", &[Admin]),
        (Method::POST, "/graduations", &[Student]),
        (Method::GET, "/graduations", &[Teacher, Admin]),
        (Method::GET, "/graduations/{id}", &[Student, Teacher, Admin]),
        (Method::PUT, "/graduations/{id}", &[Admin]),
        (Method::POST, "/registrations", &[Student, Admin]),
        (Method::GET, "/students/{id}/enrollments", &[Student, Teacher, Admin]),
        (Method::POST, "/reports", &[Student]),
        (Method::GET, "/reports", &[Teacher, Admin]),
    ];

    assert_eq!(policy.len(), expected.len());
    for (method, route, roles) in expected {
        let permitted = policy
            .permitted_roles(&method, route)
            .unwrap_or_else(|| panic!("missing entry for {method} {route}"));
        assert_eq!(permitted.iter().copied().collect::<Vec<_>>(), roles.to_vec());
    }
}

#[test]
fn teacher_cannot_decide_graduation() {
    let policy = PolicyTable::reference();

    assert_eq!(
        policy.authorize(Role::Teacher, &Method::PUT, "/graduations/{id}"),
        Err(Denial::InsufficientRole {
            role: Role::Teacher,
            method: Method::PUT,
            route: "/graduations/{id}".to_string(),
        })
    );
    assert!(policy.authorize(Role::Admin, &Method::PUT, "/graduations/{id}").is_ok());
}

#[test]
fn reference_table_covers_every_protected_route() {
    assert!(routes::uncovered_routes(&PolicyTable::reference()).is_empty());
}

#[test]
fn missing_entries_are_reported() {
    let partial = PolicyTable::new()
        .allow(Method::GET, "/me", &Role::ALL)
        .allow(Method::GET, "/reports", &[Role::Admin]);

    let missing = routes::uncovered_routes(&partial);

    assert_eq!(missing.len(), 10);
    assert!(missing.contains(&(Method::PUT, "/graduations/{id}".to_string())));
    assert!(!missing.contains(&(Method::GET, "/me".to_string())));
}
