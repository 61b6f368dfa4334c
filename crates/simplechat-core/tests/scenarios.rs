mod common;

use std::sync::Barrier;
use std::thread;

use simplechat_core::ErrorKind;
use simplechat_types::models::ContactStatus;
use simplechat_types::page::Page;

use common::Harness;

fn page() -> Page {
    Page::first(10).unwrap()
}

#[test]
fn accepted_contact_gets_exactly_one_chat() {
    let mut h = Harness::new(1);
    let a = h.user();
    let b = h.user();

    let contact = h.engine.contacts.request(a.id, &b.username).unwrap();
    assert_eq!(contact.status, ContactStatus::Pending);

    let accepted = h.engine.contacts.accept(b.id, contact.id).unwrap();
    assert_eq!(accepted.status, ContactStatus::Accepted);
    assert!(accepted.accepted_at.is_some());

    h.engine.chats.create(a.id, contact.id).unwrap();
    let err = h.engine.chats.create(b.id, contact.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn uninvolved_user_cannot_accept() {
    let mut h = Harness::new(2);
    let a = h.user();
    let b = h.user();
    let c = h.user();

    let contact = h.engine.contacts.request(a.id, &b.username).unwrap();
    let err = h.engine.contacts.accept(c.id, contact.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[test]
fn messages_are_listed_in_send_order() {
    let mut h = Harness::new(3);
    let a = h.user();
    let b = h.user();
    let contact = h.engine.contacts.request(a.id, &b.username).unwrap();
    h.engine.contacts.accept(b.id, contact.id).unwrap();
    let chat = h.engine.chats.create(a.id, contact.id).unwrap();

    h.engine.messages.send(a.id, chat.id, "hi").unwrap();
    let hello = h.engine.messages.send(b.id, chat.id, "hello").unwrap();

    let listed = h.engine.messages.list(a.id, chat.id, page()).unwrap();
    let bodies: Vec<_> = listed.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["hi", "hello"]);

    let chat = h.engine.chats.get(b.id, chat.id).unwrap();
    assert_eq!(chat.last_message_received_at, Some(hello.sent_at));
}

#[test]
fn chat_can_be_deleted_once_empty() {
    let mut h = Harness::new(4);
    let a = h.user();
    let b = h.user();
    let contact = h.engine.contacts.request(a.id, &b.username).unwrap();
    h.engine.contacts.accept(b.id, contact.id).unwrap();
    let chat = h.engine.chats.create(a.id, contact.id).unwrap();
    let msg = h.engine.messages.send(a.id, chat.id, "only message").unwrap();

    let err = h.engine.chats.delete(a.id, chat.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    h.engine.messages.delete(a.id, msg.id).unwrap();
    h.engine.chats.delete(a.id, chat.id).unwrap();

    let err = h.engine.chats.get(a.id, chat.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn concurrent_requests_have_one_winner() {
    for seed in 0..10 {
        let mut h = Harness::new(100 + seed);
        let a = h.user();
        let b = h.user();
        let barrier = Barrier::new(2);
        let (engine, barrier, addressee) = (&h.engine, &barrier, b.username.as_str());

        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    s.spawn(move || {
                        barrier.wait();
                        engine.contacts.request(a.id, addressee)
                    })
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert_eq!(loser.kind(), ErrorKind::Conflict);
    }
}

#[test]
fn crossed_requests_have_one_winner() {
    let mut h = Harness::new(5);
    let a = h.user();
    let b = h.user();
    let barrier = Barrier::new(2);

    let (ab, ba) = thread::scope(|s| {
        let ab = s.spawn(|| {
            barrier.wait();
            h.engine.contacts.request(a.id, &b.username)
        });
        let ba = s.spawn(|| {
            barrier.wait();
            h.engine.contacts.request(b.id, &a.username)
        });
        (ab.join().unwrap(), ba.join().unwrap())
    });

    assert!(ab.is_ok() ^ ba.is_ok());
    assert_eq!(h.engine.contacts.list(a.id, None, page()).unwrap().len(), 1);
}

#[test]
fn concurrent_chat_creation_has_one_winner() {
    let mut h = Harness::new(6);
    let a = h.user();
    let b = h.user();
    let contact = h.engine.contacts.request(a.id, &b.username).unwrap();
    h.engine.contacts.accept(b.id, contact.id).unwrap();
    let barrier = Barrier::new(2);
    let (engine, barrier, contact_id) = (&h.engine, &barrier, contact.id);

    let results: Vec<_> = thread::scope(|s| {
        let handles = [a.id, b.id].map(|caller| {
            s.spawn(move || {
                barrier.wait();
                engine.chats.create(caller, contact_id)
            })
        });
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(loser.kind(), ErrorKind::Conflict);
    assert_eq!(h.engine.chats.list(a.id, page()).unwrap().len(), 1);
}

#[test]
fn concurrent_sends_keep_watermark_on_newest_message() {
    let mut h = Harness::new(7);
    let a = h.user();
    let b = h.user();
    let contact = h.engine.contacts.request(a.id, &b.username).unwrap();
    h.engine.contacts.accept(b.id, contact.id).unwrap();
    let chat = h.engine.chats.create(a.id, contact.id).unwrap();

    let (engine, chat_id) = (&h.engine, chat.id);
    thread::scope(|s| {
        for (caller, tag) in [(a.id, "a"), (b.id, "b")] {
            s.spawn(move || {
                for i in 0..20 {
                    engine.messages.send(caller, chat_id, &format!("{tag}{i}")).unwrap();
                }
            });
        }
    });

    let mut all = Vec::new();
    let mut page = Page::first(10).unwrap();
    loop {
        let batch = h.engine.messages.list(a.id, chat.id, page).unwrap();
        if batch.is_empty() {
            break;
        }
        all.extend(batch);
        page = page.next();
    }

    assert_eq!(all.len(), 40);
    assert!(all.windows(2).all(|w| w[0].sent_at < w[1].sent_at));

    let watermark = h.engine.chats.get(a.id, chat.id).unwrap().last_message_received_at;
    assert_eq!(watermark, all.last().map(|m| m.sent_at));
}

#[test]
fn chat_list_is_ordered_by_recent_activity() {
    let mut h = Harness::new(8);
    let a = h.user();
    let mut chats = Vec::new();
    for _ in 0..3 {
        let other = h.user();
        let contact = h.engine.contacts.request(a.id, &other.username).unwrap();
        h.engine.contacts.accept(other.id, contact.id).unwrap();
        chats.push(h.engine.chats.create(other.id, contact.id).unwrap());
    }

    h.engine.messages.send(a.id, chats[0].id, "first").unwrap();
    h.engine.messages.send(a.id, chats[1].id, "second").unwrap();

    let listed: Vec<_> = h
        .engine
        .chats
        .list(a.id, page())
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    // Never-used chat first, then by watermark ascending
    assert_eq!(listed, vec![chats[2].id, chats[0].id, chats[1].id]);
}
