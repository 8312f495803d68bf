mod common;

use cirql::{
    cirql_manager::CirqlManager,
    error::{IdentityError, SignupError},
    flows::signup::SignupRequest,
};

fn request(code: &str, username: &str) -> SignupRequest {
    SignupRequest {
        invite_code: code.into(),
        email: format!("{username}@example.com"),
        password: common::PASSWORD.into(),
        username: username.into(),
        display_name: Some("New Friend".into()),
    }
}

#[test]
fn unknown_code_creates_nothing() {
    let ctx = common::context();
    let err = ctx
        .manager
        .sign_up(&request("CIRQL-AB12CD", "newbie"))
        .unwrap_err();
    assert!(matches!(err, SignupError::InvalidInviteCode(_)));
    assert!(matches!(
        ctx.manager
            .identities
            .sign_in("newbie@example.com", common::PASSWORD),
        Err(IdentityError::IncorrectCredentials)
    ));
}

#[test]
fn malformed_or_unknown_codes_are_invalid() {
    let ctx = common::context();
    for code in ["", "   ", "CIRQL-", "HELLO", "CIRQL-AB12CD9", "OTHER-AB12CD"] {
        assert!(
            matches!(
                ctx.manager.sign_up(&request(code, "newbie")),
                Err(SignupError::InvalidInviteCode(_))
            ),
            "{code:?}"
        );
    }
}

#[test]
fn codes_survive_a_prefix_change() {
    let ctx = common::context();
    let (issuer, _) = ctx.eligible_member("founder");
    let invite = ctx.invite_code(&issuer);

    let mut config = ctx.config.clone();
    config.invites.code_prefix = "CLOSET-".into();
    let renamed = CirqlManager::from_config(ctx.pool.clone(), &config, ctx.mailer.clone());

    assert!(!renamed.validate_invite(&invite.code).unwrap().used);
    let identity = renamed.sign_up(&request(&invite.code, "newbie")).unwrap();
    assert_eq!(
        renamed.ledger.list_issued(&issuer.id).unwrap()[0].used_by,
        Some(identity.id)
    );
}

#[test]
fn valid_code_creates_member_and_seeds_quota() {
    let ctx = common::context();
    let (issuer, _) = ctx.eligible_member("founder");
    let invite = ctx.invite_code(&issuer);

    let identity = ctx
        .manager
        .sign_up(&request(&invite.code.to_lowercase(), "newbie"))
        .unwrap();
    assert_eq!(identity.username, "newbie");
    assert_eq!(identity.display_name.as_deref(), Some("New Friend"));

    let issued = ctx.manager.ledger.list_issued(&issuer.id).unwrap();
    assert!(issued[0].used);
    assert_eq!(issued[0].used_by, Some(identity.id));

    let quota = ctx.manager.quotas.get(&identity.id).unwrap();
    assert_eq!(quota.total, ctx.config.invites.default_total);
    assert_eq!(quota.used, 0);
}

#[test]
fn used_code_is_refused() {
    let ctx = common::context();
    let (issuer, _) = ctx.eligible_member("founder");
    let invite = ctx.invite_code(&issuer);
    ctx.manager.sign_up(&request(&invite.code, "first")).unwrap();

    assert!(matches!(
        ctx.manager.sign_up(&request(&invite.code, "second")),
        Err(SignupError::CodeAlreadyUsed(_))
    ));
    assert!(ctx
        .manager
        .identities
        .sign_in("second@example.com", common::PASSWORD)
        .is_err());
}

#[test]
fn identity_failure_leaves_code_unused() {
    let ctx = common::context();
    let (issuer, _) = ctx.eligible_member("founder");
    let invite = ctx.invite_code(&issuer);

    let mut weak = request(&invite.code, "newbie");
    weak.password = "123".into();
    assert!(matches!(
        ctx.manager.sign_up(&weak),
        Err(SignupError::SignupFailed(IdentityError::WeakPassword(6)))
    ));

    let mut taken = request(&invite.code, "founder");
    taken.email = issuer.email.to_string();
    assert!(matches!(
        ctx.manager.sign_up(&taken),
        Err(SignupError::SignupFailed(IdentityError::EmailTaken(_)))
    ));

    assert!(!ctx.manager.ledger.validate(&invite.code).unwrap().used);
}

#[test]
fn landing_page_validation() {
    let ctx = common::context();
    let (issuer, _) = ctx.eligible_member("founder");
    let invite = ctx.invite_code(&issuer);
    assert_eq!(
        ctx.manager.validate_invite(&invite.code).unwrap().issuer_id,
        issuer.id
    );
    ctx.manager.sign_up(&request(&invite.code, "newbie")).unwrap();
    assert!(matches!(
        ctx.manager.validate_invite(&invite.code),
        Err(SignupError::CodeAlreadyUsed(_))
    ));
}
