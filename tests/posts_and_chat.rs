mod common;

use cirql::{
    change_feed::RowChange,
    error::{ChatError, PostError},
    posts::PostDraft,
};
use std::{thread, time::Duration};
use uuid::Uuid;

#[test]
fn post_photo_is_stored_under_author() {
    let ctx = common::context();
    let author = ctx.member("author");
    let session = ctx.session(&author);
    let post = ctx
        .manager
        .create_post(&session, common::JPEG, "image/jpeg", &PostDraft::caption("  denim jacket "))
        .unwrap();

    assert_eq!(post.caption.as_deref(), Some("denim jacket"));
    assert_eq!(post.image_path, format!("{}/{}.jpg", author.id, post.id));
    assert!(post.image_url.ends_with(&format!("/posts/{}", post.image_path)));
    let stored = ctx.config.storage.root.join("posts").join(&post.image_path);
    assert_eq!(std::fs::read(&stored).unwrap(), common::JPEG);
    assert_eq!(ctx.manager.posts.count_by_author(&author.id).unwrap(), 1);
}

#[test]
fn unsupported_or_empty_images_are_rejected() {
    let ctx = common::context();
    let session = ctx.session(&ctx.member("author"));
    assert!(matches!(
        ctx.manager
            .create_post(&session, common::JPEG, "application/pdf", &PostDraft::default()),
        Err(PostError::UnsupportedImageType(_))
    ));
    assert!(matches!(
        ctx.manager.create_post(&session, &[], "image/png", &PostDraft::default()),
        Err(PostError::EmptyImage)
    ));
}

#[test]
fn only_author_deletes_post() {
    let ctx = common::context();
    let author = ctx.session(&ctx.member("author"));
    let other = ctx.session(&ctx.member("other"));
    let post = ctx
        .manager
        .create_post(&author, common::JPEG, "image/jpeg", &PostDraft::default())
        .unwrap();

    assert!(matches!(
        ctx.manager.delete_post(&other, &post.id),
        Err(PostError::NotAuthor)
    ));
    ctx.manager.delete_post(&author, &post.id).unwrap();
    assert!(!ctx
        .config
        .storage
        .root
        .join("posts")
        .join(&post.image_path)
        .exists());
    assert!(matches!(
        ctx.manager.delete_post(&author, &post.id),
        Err(PostError::PostNotFound(_))
    ));
}

#[test]
fn story_and_price_are_kept() {
    let ctx = common::context();
    let session = ctx.session(&ctx.member("author"));
    let draft = PostDraft {
        caption: Some("wool coat".into()),
        story: Some("  worn to my first job interview ".into()),
        price: Some(40),
    };
    let post = ctx
        .manager
        .create_post(&session, common::JPEG, "image/jpeg", &draft)
        .unwrap();
    let stored = ctx.manager.posts.get(&post.id).unwrap().unwrap();
    assert_eq!(stored.story.as_deref(), Some("worn to my first job interview"));
    assert_eq!(stored.price, Some(40));

    let negative = PostDraft {
        price: Some(-1),
        ..PostDraft::default()
    };
    assert!(matches!(
        ctx.manager
            .create_post(&session, common::JPEG, "image/jpeg", &negative),
        Err(PostError::InvalidPrice)
    ));
    assert_eq!(ctx.manager.posts.count_by_author(session.user_id()).unwrap(), 1);
}

#[test]
fn only_author_edits_caption_and_price() {
    let ctx = common::context();
    let author = ctx.session(&ctx.member("author"));
    let other = ctx.session(&ctx.member("other"));
    let post = ctx
        .manager
        .create_post(
            &author,
            common::JPEG,
            "image/jpeg",
            &PostDraft {
                caption: Some("linen shirt".into()),
                story: Some("bought in Lisbon".into()),
                price: Some(25),
            },
        )
        .unwrap();
    let edit = PostDraft {
        caption: Some(" linen shirt, barely worn ".into()),
        story: Some("ignored".into()),
        price: None,
    };

    assert!(matches!(
        ctx.manager.update_post(&other, &post.id, &edit),
        Err(PostError::NotAuthor)
    ));
    let updated = ctx.manager.update_post(&author, &post.id, &edit).unwrap();
    assert_eq!(updated.caption.as_deref(), Some("linen shirt, barely worn"));
    assert_eq!(updated.price, None);
    assert_eq!(updated.story.as_deref(), Some("bought in Lisbon"));
    assert_eq!(updated.image_path, post.image_path);

    assert!(matches!(
        ctx.manager.update_post(
            &author,
            &post.id,
            &PostDraft {
                price: Some(-5),
                ..PostDraft::default()
            }
        ),
        Err(PostError::InvalidPrice)
    ));
    assert!(matches!(
        ctx.manager
            .update_post(&author, &Uuid::new_v4(), &PostDraft::default()),
        Err(PostError::PostNotFound(_))
    ));
}

#[test]
fn feed_is_newest_first_and_clamped() {
    let ctx = common::context();
    let session = ctx.session(&ctx.member("author"));
    for i in 0..3 {
        ctx.manager
            .create_post(&session, common::JPEG, "image/jpeg", &PostDraft::caption(&format!("post {i}")))
            .unwrap();
        thread::sleep(Duration::from_millis(5));
    }
    let feed = ctx.manager.feed(10).unwrap();
    let captions: Vec<_> = feed.iter().filter_map(|p| p.caption.as_deref()).collect();
    assert_eq!(captions, vec!["post 2", "post 1", "post 0"]);
    assert_eq!(ctx.manager.feed(0).unwrap().len(), 1);
}

#[test]
fn avatar_upload_updates_profile() {
    let ctx = common::context();
    let member = ctx.member("member");
    let session = ctx.session(&member);
    let identity = ctx
        .manager
        .upload_avatar(&session, &[0x89, 0x50, 0x4e, 0x47], "image/png")
        .unwrap();
    assert_eq!(
        identity.avatar_url,
        Some(format!(
            "http://localhost:8886/storage/avatars/{}.png",
            member.id
        ))
    );
}

#[test]
fn conversation_is_shared_by_the_pair() {
    let ctx = common::context();
    let alice = ctx.session(&ctx.member("alice"));
    let bob = ctx.session(&ctx.member("bob"));
    let post_id = ctx
        .manager
        .create_post(&bob, common::JPEG, "image/jpeg", &PostDraft::default())
        .unwrap()
        .id;

    let opened = ctx
        .manager
        .open_conversation(&alice, bob.user_id(), Some(&post_id))
        .unwrap();
    let reopened = ctx
        .manager
        .open_conversation(&bob, alice.user_id(), Some(&post_id))
        .unwrap();
    assert_eq!(opened.id, reopened.id);
    assert!(opened.includes(alice.user_id()) && opened.includes(bob.user_id()));

    let general = ctx
        .manager
        .open_conversation(&alice, bob.user_id(), None)
        .unwrap();
    assert_ne!(general.id, opened.id);
    assert_eq!(ctx.manager.list_conversations(&bob).unwrap().len(), 2);
}

#[test]
fn invalid_conversations_are_rejected() {
    let ctx = common::context();
    let alice = ctx.session(&ctx.member("alice"));
    assert!(matches!(
        ctx.manager
            .open_conversation(&alice, alice.user_id(), None),
        Err(ChatError::SelfConversation)
    ));
    assert!(matches!(
        ctx.manager.open_conversation(&alice, &Uuid::new_v4(), None),
        Err(ChatError::UnknownParticipant(_))
    ));
}

#[test]
fn messages_unread_counts_and_read_markers() {
    let ctx = common::context();
    let alice = ctx.session(&ctx.member("alice"));
    let bob = ctx.session(&ctx.member("bob"));
    let carol = ctx.session(&ctx.member("carol"));
    let conversation = ctx
        .manager
        .open_conversation(&alice, bob.user_id(), None)
        .unwrap();

    ctx.manager
        .send_message(&alice, &conversation.id, " is this still available? ")
        .unwrap();
    ctx.manager
        .send_message(&alice, &conversation.id, "I can pick it up")
        .unwrap();
    assert_eq!(ctx.manager.unread_count(&bob).unwrap(), 2);
    assert_eq!(ctx.manager.unread_count(&alice).unwrap(), 0);

    let messages = ctx.manager.list_messages(&bob, &conversation.id).unwrap();
    assert_eq!(messages[0].content, "is this still available?");
    assert_eq!(messages.len(), 2);

    let updated = ctx.manager.mark_read(&bob, &conversation.id).unwrap();
    assert_eq!(updated.len(), 2);
    assert!(updated.iter().all(|message| message.read_at.is_some()));
    assert_eq!(ctx.manager.unread_count(&bob).unwrap(), 0);

    assert!(matches!(
        ctx.manager.list_messages(&carol, &conversation.id),
        Err(ChatError::NotParticipant)
    ));
    assert!(matches!(
        ctx.manager.send_message(&alice, &conversation.id, "   "),
        Err(ChatError::InvalidContent(_))
    ));
    assert!(matches!(
        ctx.manager
            .send_message(&alice, &conversation.id, &"x".repeat(2001)),
        Err(ChatError::InvalidContent(_))
    ));
    assert!(matches!(
        ctx.manager.mark_read(&alice, &Uuid::new_v4()),
        Err(ChatError::ConversationNotFound(_))
    ));
}

#[test]
fn chat_list_follows_latest_activity() {
    let ctx = common::context();
    let alice = ctx.session(&ctx.member("alice"));
    let bob = ctx.session(&ctx.member("bob"));
    let carol = ctx.session(&ctx.member("carol"));
    let with_bob = ctx
        .manager
        .open_conversation(&alice, bob.user_id(), None)
        .unwrap();
    thread::sleep(Duration::from_millis(5));
    let with_carol = ctx
        .manager
        .open_conversation(&alice, carol.user_id(), None)
        .unwrap();
    assert_eq!(with_carol.last_message_at, with_carol.created_at);

    let summaries = ctx.manager.conversation_summaries(&alice).unwrap();
    assert_eq!(summaries[0].conversation.id, with_carol.id);
    assert!(summaries[0].last_message.is_none());

    thread::sleep(Duration::from_millis(5));
    ctx.manager
        .send_message(&bob, &with_bob.id, "still selling the boots?")
        .unwrap();
    thread::sleep(Duration::from_millis(5));
    let reply = ctx
        .manager
        .send_message(&bob, &with_bob.id, "size 42")
        .unwrap();

    let summaries = ctx.manager.conversation_summaries(&alice).unwrap();
    let ids: Vec<Uuid> = summaries.iter().map(|s| s.conversation.id).collect();
    assert_eq!(ids, vec![with_bob.id, with_carol.id]);
    let latest = &summaries[0];
    assert_eq!(latest.conversation.last_message_at, reply.created_at);
    assert_eq!(latest.last_message.as_ref(), Some(&reply));
    assert_eq!(latest.unread_count, 2);
    assert_eq!(
        latest.other_member.as_ref().map(|m| m.username.as_str()),
        Some("bob")
    );
    assert_eq!(summaries[1].unread_count, 0);

    let for_bob = ctx.manager.conversation_summaries(&bob).unwrap();
    assert_eq!(for_bob.len(), 1);
    assert_eq!(for_bob[0].unread_count, 0);
}

#[tokio::test]
async fn subscription_sees_inserts_and_read_markers() {
    let ctx = common::context();
    let alice = ctx.session(&ctx.member("alice"));
    let bob = ctx.session(&ctx.member("bob"));
    let conversation = ctx
        .manager
        .open_conversation(&alice, bob.user_id(), None)
        .unwrap();
    let mut subscription = ctx
        .manager
        .subscribe_messages(&bob, &conversation.id)
        .unwrap();

    let sent = ctx
        .manager
        .send_message(&alice, &conversation.id, "hello")
        .unwrap();
    ctx.manager.mark_read(&bob, &conversation.id).unwrap();

    match subscription.recv().await {
        Some(RowChange::MessageInserted(message)) => assert_eq!(message, sent),
        other => panic!("unexpected change {other:?}"),
    }
    match subscription.recv().await {
        Some(RowChange::MessageUpdated(message)) => {
            assert_eq!(message.id, sent.id);
            assert!(message.read_at.is_some());
        }
        other => panic!("unexpected change {other:?}"),
    }
    subscription.unsubscribe();
}

#[test]
fn outsiders_cannot_subscribe() {
    let ctx = common::context();
    let alice = ctx.session(&ctx.member("alice"));
    let bob = ctx.session(&ctx.member("bob"));
    let carol = ctx.session(&ctx.member("carol"));
    let conversation = ctx
        .manager
        .open_conversation(&alice, bob.user_id(), None)
        .unwrap();
    assert!(matches!(
        ctx.manager.subscribe_messages(&carol, &conversation.id),
        Err(ChatError::NotParticipant)
    ));
}
