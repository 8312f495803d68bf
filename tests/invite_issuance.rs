mod common;

use cirql::error::IssuanceError;

#[test]
fn last_invite_then_exhausted() {
    let ctx = common::context();
    let (issuer, session) = ctx.eligible_member("founder");
    let total = ctx.config.invites.default_total;
    for _ in 1..total {
        ctx.manager.quotas.consume_one(&issuer.id).unwrap();
    }
    assert_eq!(ctx.manager.quotas.get(&issuer.id).unwrap().remaining(), 1);

    let issued = ctx.manager.issue_invite(&session).unwrap();
    assert_eq!(issued.remaining, 0);
    assert_eq!(ctx.manager.quotas.get(&issuer.id).unwrap().remaining(), 0);
    assert!(!ctx.manager.ledger.validate(&issued.code).unwrap().used);

    assert!(matches!(
        ctx.manager.issue_invite(&session),
        Err(IssuanceError::QuotaExhausted)
    ));
    assert_eq!(ctx.manager.ledger.list_issued(&issuer.id).unwrap().len(), 1);
}

#[test]
fn too_few_posts_is_not_eligible() {
    let ctx = common::context();
    let issuer = ctx.member("newbie");
    let session = ctx.session(&issuer);
    ctx.add_posts(&session, 1);

    assert!(matches!(
        ctx.manager.issue_invite(&session),
        Err(IssuanceError::NotEligible { shortfall: 1 })
    ));
    assert!(ctx.manager.ledger.list_issued(&issuer.id).unwrap().is_empty());
    let quota = ctx.manager.quotas.get(&issuer.id).unwrap();
    assert_eq!(quota.used, 0);
}

#[test]
fn deleting_posts_revokes_eligibility() {
    let ctx = common::context();
    let (_, session) = ctx.eligible_member("founder");
    let post = ctx.manager.feed(1).unwrap().remove(0);
    ctx.manager.delete_post(&session, &post.id).unwrap();
    assert!(matches!(
        ctx.manager.issue_invite(&session),
        Err(IssuanceError::NotEligible { shortfall: 1 })
    ));
}

#[test]
fn invite_link_and_message() {
    let ctx = common::context();
    let (_, session) = ctx.eligible_member("founder");
    let issued = ctx.manager.issue_invite(&session).unwrap();
    assert!(issued.code.starts_with("CIRQL-"));
    assert_eq!(
        issued.link,
        format!("https://cirql.test/?invite={}", issued.code)
    );
    assert!(issued.message.starts_with("founder "));
    assert!(issued.message.ends_with(&issued.link));
}

#[test]
fn overview_lists_codes_and_quota() {
    let ctx = common::context();
    let (issuer, session) = ctx.eligible_member("founder");
    ctx.manager.issue_invite(&session).unwrap();
    ctx.manager.issue_invite(&session).unwrap();

    let overview = ctx.manager.invite_overview(&session).unwrap();
    assert_eq!(overview.invites.len(), 2);
    assert!(overview.invites.iter().all(|invite| invite.issuer_id == issuer.id));
    assert_eq!(overview.authored_posts, ctx.config.invites.min_posts);
    let quota = overview.quota.unwrap();
    assert_eq!(quota.used, 2);
}
