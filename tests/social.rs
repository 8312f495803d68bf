mod common;

use cirql::{
    error::{Error, SocialError},
    posts::PostDraft,
};
use std::{thread, time::Duration};
use uuid::Uuid;

#[test]
fn follows_are_idempotent_and_counted() {
    let ctx = common::context();
    let alice = ctx.member("alice");
    let bob = ctx.member("bob");
    let carol = ctx.member("carol");
    let alice_session = ctx.session(&alice);
    let carol_session = ctx.session(&carol);

    ctx.manager.follow_member(&alice_session, &bob.id).unwrap();
    ctx.manager.follow_member(&alice_session, &bob.id).unwrap();
    thread::sleep(Duration::from_millis(5));
    ctx.manager.follow_member(&carol_session, &bob.id).unwrap();

    let followers: Vec<String> = ctx
        .manager
        .followers(&bob.id)
        .unwrap()
        .into_iter()
        .map(|profile| profile.username)
        .collect();
    assert_eq!(followers, vec!["carol", "alice"]);
    assert_eq!(ctx.manager.following(&alice.id).unwrap()[0].user_id, bob.id);

    let overview = ctx.manager.member_overview(&alice_session, &bob.id).unwrap();
    assert_eq!(overview.follows.followers, 2);
    assert_eq!(overview.follows.following, 0);
    assert!(overview.is_following);

    ctx.manager.unfollow_member(&alice_session, &bob.id).unwrap();
    ctx.manager.unfollow_member(&alice_session, &bob.id).unwrap();
    let overview = ctx.manager.member_overview(&alice_session, &bob.id).unwrap();
    assert_eq!(overview.follows.followers, 1);
    assert!(!overview.is_following);
}

#[test]
fn invalid_follows_are_rejected() {
    let ctx = common::context();
    let alice = ctx.member("alice");
    let session = ctx.session(&alice);
    assert!(matches!(
        ctx.manager.follow_member(&session, &alice.id),
        Err(SocialError::SelfFollow)
    ));
    assert!(matches!(
        ctx.manager.follow_member(&session, &Uuid::new_v4()),
        Err(SocialError::UnknownMember(_))
    ));
    assert!(matches!(
        ctx.manager.member_overview(&session, &Uuid::new_v4()),
        Err(Error::Social(SocialError::UnknownMember(_)))
    ));
}

#[test]
fn overview_counts_posts() {
    let ctx = common::context();
    let alice = ctx.member("alice");
    let session = ctx.session(&alice);
    ctx.add_posts(&session, 2);
    let overview = ctx.manager.member_overview(&session, &alice.id).unwrap();
    assert_eq!(overview.profile.username, "alice");
    assert_eq!(overview.posts_count, 2);
    assert!(!overview.is_following);
}

#[test]
fn feed_entries_carry_reactions() {
    let ctx = common::context();
    let author = ctx.session(&ctx.member("author"));
    let fan = ctx.session(&ctx.member("fan"));
    ctx.add_posts(&author, 2);
    let feed = ctx.manager.feed(10).unwrap();
    let liked = feed[0].id;

    ctx.manager.like_post(&fan, &liked).unwrap();
    ctx.manager.like_post(&fan, &liked).unwrap();
    ctx.manager.like_post(&author, &liked).unwrap();
    ctx.manager.add_comment(&fan, &liked, "love it").unwrap();

    let entries = ctx.manager.with_reactions(&fan, feed).unwrap();
    assert_eq!(entries[0].post.id, liked);
    assert_eq!(entries[0].likes_count, 2);
    assert_eq!(entries[0].comments_count, 1);
    assert!(entries[0].is_liked);
    assert_eq!(entries[1].likes_count, 0);
    assert_eq!(entries[1].comments_count, 0);
    assert!(!entries[1].is_liked);

    ctx.manager.unlike_post(&fan, &liked).unwrap();
    ctx.manager.unlike_post(&fan, &liked).unwrap();
    let entries = ctx
        .manager
        .with_reactions(&fan, ctx.manager.feed(10).unwrap())
        .unwrap();
    assert_eq!(entries[0].likes_count, 1);
    assert!(!entries[0].is_liked);

    assert!(matches!(
        ctx.manager.like_post(&fan, &Uuid::new_v4()),
        Err(SocialError::PostNotFound(_))
    ));
}

#[test]
fn comments_are_ordered_and_owned() {
    let ctx = common::context();
    let author = ctx.session(&ctx.member("author"));
    let fan = ctx.session(&ctx.member("fan"));
    ctx.add_posts(&author, 1);
    let post_id = ctx.manager.feed(1).unwrap()[0].id;

    let first = ctx
        .manager
        .add_comment(&fan, &post_id, "  what size is it? ")
        .unwrap();
    thread::sleep(Duration::from_millis(5));
    ctx.manager.add_comment(&author, &post_id, "M").unwrap();

    let comments = ctx.manager.list_comments(&post_id).unwrap();
    let contents: Vec<&str> = comments.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, vec!["what size is it?", "M"]);

    assert!(matches!(
        ctx.manager.delete_comment(&author, &first.id),
        Err(SocialError::NotCommentAuthor)
    ));
    ctx.manager.delete_comment(&fan, &first.id).unwrap();
    assert!(matches!(
        ctx.manager.delete_comment(&fan, &first.id),
        Err(SocialError::CommentNotFound(_))
    ));
    assert_eq!(ctx.manager.list_comments(&post_id).unwrap().len(), 1);

    assert!(matches!(
        ctx.manager.add_comment(&fan, &post_id, "   "),
        Err(SocialError::InvalidComment(_))
    ));
    assert!(matches!(
        ctx.manager.add_comment(&fan, &post_id, &"x".repeat(501)),
        Err(SocialError::InvalidComment(_))
    ));
    assert!(matches!(
        ctx.manager.add_comment(&fan, &Uuid::new_v4(), "hello?"),
        Err(SocialError::PostNotFound(_))
    ));
}

#[test]
fn deleting_a_post_drops_its_reactions() {
    let ctx = common::context();
    let author = ctx.session(&ctx.member("author"));
    let fan = ctx.session(&ctx.member("fan"));
    ctx.add_posts(&author, 1);
    let post_id = ctx.manager.feed(1).unwrap()[0].id;
    ctx.manager.like_post(&fan, &post_id).unwrap();
    ctx.manager.add_comment(&fan, &post_id, "nice").unwrap();

    ctx.manager.delete_post(&author, &post_id).unwrap();
    assert!(ctx.manager.list_comments(&post_id).unwrap().is_empty());
    assert!(ctx.manager.likes.counts(&[post_id]).unwrap().is_empty());
}

#[test]
fn search_matches_members_and_posts() {
    let ctx = common::context();
    let vintage = ctx.member("vintage_vera");
    ctx.member("bob");
    let session = ctx.session(&vintage);
    for draft in [
        PostDraft::caption("Vintage denim jacket"),
        PostDraft {
            caption: Some("boots".into()),
            story: Some("found at a vintage market".into()),
            price: None,
        },
        PostDraft::caption("plain tee"),
        PostDraft::caption("100% wool"),
    ] {
        ctx.manager
            .create_post(&session, common::JPEG, "image/jpeg", &draft)
            .unwrap();
        thread::sleep(Duration::from_millis(5));
    }

    let results = ctx.manager.search("VINTAGE").unwrap();
    assert_eq!(results.members.len(), 1);
    assert_eq!(results.members[0].user_id, vintage.id);
    let captions: Vec<_> = results
        .posts
        .iter()
        .filter_map(|post| post.caption.as_deref())
        .collect();
    assert_eq!(captions, vec!["boots", "Vintage denim jacket"]);

    let percent = ctx.manager.search("0%").unwrap();
    assert_eq!(percent.posts.len(), 1);
    assert!(ctx.manager.search("_").unwrap().members.len() == 1);

    let empty = ctx.manager.search("   ").unwrap();
    assert!(empty.members.is_empty() && empty.posts.is_empty());
}
