//! End-to-end tests against an in-memory SQLite database.

#![cfg(all(feature = "sqlite", feature = "derive"))]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlweave::prelude::*;
use sqlweave::{
    DeleteQuery, Dialect, QueryEvent, QueryHooks, Row, SelectQuery, SqliteDialect, Value,
    create_table,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Settings {
    theme: String,
    tags: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Model)]
struct Address {
    street: String,
    city: String,
}

#[derive(Debug, Default, Model)]
#[orm(table = "users")]
struct User {
    #[orm(pk, autoincrement)]
    id: i64,
    name: String,
    #[orm(json)]
    settings: Settings,
    #[orm(embed = "home_")]
    home: Address,
    #[orm(soft_delete)]
    deleted_at: Option<DateTime<Utc>>,
    #[orm(has_one)]
    profile: Option<Profile>,
    #[orm(has_many, join = "id=author_id", order = "id")]
    posts: Vec<Post>,
}

#[derive(Debug, Default, Model)]
struct Profile {
    #[orm(pk, autoincrement)]
    id: i64,
    user_id: i64,
    bio: String,
}

#[derive(Debug, Default, Model)]
struct Post {
    #[orm(pk, autoincrement)]
    id: i64,
    author_id: i64,
    title: String,
    #[orm(belongs_to, join = "author_id=id")]
    author: Option<Box<User>>,
    #[orm(m2m = "post_tags", order = "name")]
    tags: Vec<Tag>,
}

#[derive(Debug, Default, Model)]
struct Tag {
    #[orm(pk, autoincrement)]
    id: i64,
    #[orm(unique)]
    name: String,
}

static NOTE_SELECTS: AtomicUsize = AtomicUsize::new(0);

struct NoteHooks;

impl QueryHooks for NoteHooks {
    fn before_select(&self, query: &mut SelectQuery) -> OrmResult<()> {
        query.add_where("? <> ?", (ident("note.body"), "hidden"));
        Ok(())
    }

    fn after_select(&self, event: &QueryEvent<'_>) -> OrmResult<()> {
        assert_eq!(event.table, "notes");
        NOTE_SELECTS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn before_delete(&self, query: &mut DeleteQuery) -> OrmResult<()> {
        let _ = query;
        Err(OrmError::hook("notes are append-only"))
    }
}

#[derive(Debug, Default, Model)]
#[orm(hooks = NoteHooks)]
struct Note {
    #[orm(pk, autoincrement)]
    id: i64,
    body: String,
}

static MEMO_BEFORE: AtomicUsize = AtomicUsize::new(0);
static MEMO_AFTER: AtomicUsize = AtomicUsize::new(0);

struct MemoHooks;

impl QueryHooks for MemoHooks {
    fn before_select(&self, query: &mut SelectQuery) -> OrmResult<()> {
        MEMO_BEFORE.fetch_add(1, Ordering::SeqCst);
        query.add_where("? <> ?", (ident("memo.body"), "hidden"));
        Ok(())
    }

    fn after_select(&self, event: &QueryEvent<'_>) -> OrmResult<()> {
        assert_eq!(event.table, "memos");
        MEMO_AFTER.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Default, Model)]
#[orm(hooks = MemoHooks)]
struct Memo {
    #[orm(pk, autoincrement)]
    id: i64,
    body: String,
}

#[derive(Debug, Default, Model)]
#[orm(table = "docs")]
struct Doc {
    #[orm(pk, autoincrement)]
    id: i64,
    title: String,
    #[orm(embed = "addr_")]
    addr: Option<Address>,
    #[orm(embed = "alt_")]
    alt: Option<Box<Address>>,
}

/// Posts sharing an author with the draft; the draft may have none.
#[derive(Debug, Default, Model)]
struct Draft {
    #[orm(pk, autoincrement)]
    id: i64,
    author_id: Option<i64>,
    #[orm(join = "author_id=author_id")]
    related: Vec<Post>,
}

/// Counts the statements sent through it.
struct CountingConn<'a> {
    inner: &'a SqliteConn,
    statements: AtomicUsize,
}

impl<'a> CountingConn<'a> {
    fn new(inner: &'a SqliteConn) -> Self {
        Self {
            inner,
            statements: AtomicUsize::new(0),
        }
    }

    fn statements(&self) -> usize {
        self.statements.load(Ordering::SeqCst)
    }
}

impl Conn for CountingConn<'_> {
    fn dialect(&self) -> &dyn Dialect {
        self.inner.dialect()
    }

    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Vec<Row>>> + Send {
        self.statements.fetch_add(1, Ordering::SeqCst);
        self.inner.query(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> impl Future<Output = OrmResult<u64>> + Send {
        self.statements.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(sql, params)
    }
}

async fn setup() -> SqliteConn {
    let conn = SqliteConn::open_in_memory().unwrap();
    create_table::<User>().exec(&conn).await.unwrap();
    create_table::<Profile>().exec(&conn).await.unwrap();
    create_table::<Post>().exec(&conn).await.unwrap();
    create_table::<Tag>().exec(&conn).await.unwrap();
    create_table::<Note>().exec(&conn).await.unwrap();
    conn.batch_execute("CREATE TABLE post_tags (post_id INTEGER NOT NULL, tag_id INTEGER NOT NULL)")
        .await
        .unwrap();
    conn
}

fn user(name: &str) -> User {
    User {
        name: name.to_string(),
        home: Address {
            street: "1 Main St".into(),
            city: "Springfield".into(),
        },
        ..Default::default()
    }
}

async fn insert_user(conn: &SqliteConn, name: &str) -> User {
    let mut u = user(name);
    u.id = insert()
        .model_value(&u)
        .returning("id", ())
        .fetch_one::<i64, _>(conn)
        .await
        .unwrap();
    u
}

async fn insert_post(conn: &SqliteConn, author_id: i64, title: &str) -> i64 {
    let post = Post {
        author_id,
        title: title.to_string(),
        ..Default::default()
    };
    insert()
        .model_value(&post)
        .returning("id", ())
        .fetch_one::<i64, _>(conn)
        .await
        .unwrap()
}

#[tokio::test]
async fn insert_and_scan_round_trip() {
    let conn = setup().await;
    let mut u = user("o'neil ? \\ \"quoted\"");
    u.settings = Settings {
        theme: "dark\n\"night\" ü ?".into(),
        tags: vec!["a".into(), "b'c".into()],
    };
    let id = insert()
        .model_value(&u)
        .returning("id", ())
        .fetch_one::<i64, _>(&conn)
        .await
        .unwrap();
    assert!(id > 0);

    let got: User = select()
        .model::<User>()
        .eq("id", id)
        .scan_one(&conn)
        .await
        .unwrap();
    assert_eq!(got.id, id);
    assert_eq!(got.name, u.name);
    assert_eq!(got.settings, u.settings);
    assert_eq!(got.home, u.home);
    assert_eq!(got.deleted_at, None);
    assert!(got.profile.is_none());
    assert!(got.posts.is_empty());
}

#[tokio::test]
async fn json_keeps_control_characters_and_escapes_nul() {
    let conn = setup().await;
    let mut u = user("nul");
    u.settings.theme = "a\u{0}b\u{1}c".into();
    u.settings.tags = vec!["\t\r".into()];
    let id = insert()
        .model_value(&u)
        .returning("id", ())
        .fetch_one::<i64, _>(&conn)
        .await
        .unwrap();

    let got: User = select()
        .model::<User>()
        .eq("id", id)
        .scan_one(&conn)
        .await
        .unwrap();
    assert_eq!(got.settings.theme, "a\\u0000b\u{1}c");
    assert_eq!(got.settings.tags, ["\t\r"]);
}

#[tokio::test]
async fn optional_embeds_are_nullable_and_round_trip() {
    let conn = setup().await;
    let ddl = create_table::<Doc>().build(&SqliteDialect).unwrap().sql;
    assert!(ddl.contains(r#""title" TEXT NOT NULL"#), "{ddl}");
    assert!(ddl.contains(r#""addr_street" TEXT,"#), "{ddl}");
    assert!(ddl.contains(r#""alt_city" TEXT,"#), "{ddl}");
    create_table::<Doc>().exec(&conn).await.unwrap();

    let home = Address {
        street: "2 Elm St".into(),
        city: "Ogdenville".into(),
    };
    for doc in [
        Doc {
            title: "empty".into(),
            ..Default::default()
        },
        Doc {
            title: "full".into(),
            addr: Some(home.clone()),
            alt: Some(Box::new(home.clone())),
            ..Default::default()
        },
    ] {
        insert().model_value(&doc).exec(&conn).await.unwrap();
    }

    let docs: Vec<Doc> = select()
        .model::<Doc>()
        .order("id")
        .scan_all(&conn)
        .await
        .unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].title, "empty");
    assert!(docs[0].addr.is_none());
    assert!(docs[0].alt.is_none());
    assert_eq!(docs[1].addr.as_ref(), Some(&home));
    assert_eq!(docs[1].alt.as_deref(), Some(&home));
}

#[tokio::test]
async fn scan_one_without_rows_is_not_found() {
    let conn = setup().await;
    let err = select()
        .model::<User>()
        .eq("id", 404)
        .scan_one::<User, _>(&conn)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn unknown_column_fails_for_models_but_not_maps() {
    let conn = setup().await;
    insert_user(&conn, "ann").await;

    let q = || {
        select()
            .model::<User>()
            .column("id")
            .column_expr("42 AS ?", (ident("extra"),))
    };
    let err = q().scan_one::<User, _>(&conn).await.unwrap_err();
    match err {
        OrmError::UnknownColumn { model, column } => {
            assert_eq!(model, "User");
            assert_eq!(column, "extra");
        }
        other => panic!("unexpected error: {other}"),
    }

    let row: HashMap<String, Value> = q().fetch_one(&conn).await.unwrap();
    assert_eq!(row["extra"], Value::Int(42));
}

#[tokio::test]
async fn scan_and_count_ignores_limit() {
    let conn = setup().await;
    for name in ["a", "b", "c"] {
        insert_user(&conn, name).await;
    }
    let (users, total) = select()
        .model::<User>()
        .order("name DESC")
        .limit(2)
        .scan_and_count::<User, _>(&conn)
        .await
        .unwrap();
    assert_eq!(total, 3);
    let names: Vec<_> = users.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, ["c", "b"]);
}

#[tokio::test]
async fn soft_delete_hides_rows() {
    let conn = setup().await;
    let ann = insert_user(&conn, "ann").await;
    insert_user(&conn, "bob").await;

    let n = delete().model_value(&ann).where_pk().exec(&conn).await.unwrap();
    assert_eq!(n, 1);

    assert_eq!(select().model::<User>().count(&conn).await.unwrap(), 1);
    assert_eq!(
        select().model::<User>().where_deleted().count(&conn).await.unwrap(),
        1
    );
    let deleted: User = select()
        .model::<User>()
        .where_deleted()
        .scan_one(&conn)
        .await
        .unwrap();
    assert!(deleted.deleted_at.is_some());

    delete()
        .model_value(&ann)
        .where_pk()
        .force_delete()
        .exec(&conn)
        .await
        .unwrap();
    assert_eq!(
        select()
            .model::<User>()
            .where_all_with_deleted()
            .count(&conn)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn update_by_primary_key() {
    let conn = setup().await;
    let mut ann = insert_user(&conn, "ann").await;
    ann.name = "anne".into();
    ann.home.city = "Shelbyville".into();
    let n = update().model_value(&ann).where_pk().exec(&conn).await.unwrap();
    assert_eq!(n, 1);

    let got: User = select()
        .model_value(&ann)
        .where_pk()
        .scan_one(&conn)
        .await
        .unwrap();
    assert_eq!(got.name, "anne");
    assert_eq!(got.home.city, "Shelbyville");

    let n = update()
        .model::<User>()
        .set_column("name", "x")
        .eq("name", "nobody")
        .exec(&conn)
        .await
        .unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn to_one_relations_are_joined() {
    let conn = setup().await;
    let ann = insert_user(&conn, "ann").await;
    insert()
        .model_value(&Profile {
            user_id: ann.id,
            bio: "hello".into(),
            ..Default::default()
        })
        .exec(&conn)
        .await
        .unwrap();
    insert_post(&conn, ann.id, "first").await;
    insert_post(&conn, 999, "orphan").await;

    let posts: Vec<Post> = select()
        .model::<Post>()
        .relation("author")
        .relation("author.profile")
        .order("post.id")
        .scan_all(&conn)
        .await
        .unwrap();
    assert_eq!(posts.len(), 2);

    let author = posts[0].author.as_ref().expect("author loaded");
    assert_eq!(author.name, "ann");
    assert_eq!(author.home.street, "1 Main St");
    assert_eq!(author.profile.as_ref().map(|p| p.bio.as_str()), Some("hello"));
    assert!(posts[1].author.is_none());
}

#[tokio::test]
async fn has_many_loads_in_one_follow_up() {
    let conn = setup().await;
    let ann = insert_user(&conn, "ann").await;
    let bob = insert_user(&conn, "bob").await;
    insert_post(&conn, ann.id, "one").await;
    insert_post(&conn, ann.id, "two").await;

    let users: Vec<User> = select()
        .model::<User>()
        .relation_with("posts", |q| q.column("title"))
        .order("user.id")
        .scan_all(&conn)
        .await
        .unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].id, ann.id);
    let titles: Vec<_> = users[0].posts.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, ["one", "two"]);
    assert!(users[0].posts.iter().all(|p| p.author_id == ann.id));
    assert_eq!(users[1].id, bob.id);
    assert!(users[1].posts.is_empty());
}

#[tokio::test]
async fn has_many_with_no_parents_is_empty() {
    let conn = setup().await;
    let users: Vec<User> = select()
        .model::<User>()
        .relation("posts")
        .scan_all(&conn)
        .await
        .unwrap();
    assert!(users.is_empty());
}

#[tokio::test]
async fn parents_without_keys_issue_no_follow_up() {
    let conn = setup().await;
    create_table::<Draft>().exec(&conn).await.unwrap();
    for _ in 0..2 {
        insert().model_value(&Draft::default()).exec(&conn).await.unwrap();
    }
    let ann = insert_user(&conn, "ann").await;
    insert_post(&conn, ann.id, "p").await;

    let counting = CountingConn::new(&conn);
    let drafts: Vec<Draft> = select()
        .model::<Draft>()
        .relation("related")
        .scan_all(&counting)
        .await
        .unwrap();
    assert_eq!(drafts.len(), 2);
    assert!(drafts.iter().all(|d| d.related.is_empty()));
    assert_eq!(counting.statements(), 1);

    let counting = CountingConn::new(&conn);
    let users: Vec<User> = select()
        .model::<User>()
        .relation("posts._")
        .scan_all(&counting)
        .await
        .unwrap();
    assert_eq!(users.len(), 1);
    assert!(users[0].posts.is_empty());
    assert_eq!(counting.statements(), 1);

    let counting = CountingConn::new(&conn);
    let users: Vec<User> = select()
        .model::<User>()
        .relation("posts")
        .scan_all(&counting)
        .await
        .unwrap();
    assert_eq!(users[0].posts.len(), 1);
    assert_eq!(counting.statements(), 2);
}

#[tokio::test]
async fn many_to_many_through_junction() {
    let conn = setup().await;
    let ann = insert_user(&conn, "ann").await;
    let p1 = insert_post(&conn, ann.id, "tagged").await;
    let p2 = insert_post(&conn, ann.id, "untagged").await;

    let mut tag_ids = Vec::new();
    for name in ["rust", "db"] {
        let tag = Tag {
            name: name.into(),
            ..Default::default()
        };
        let id: i64 = insert()
            .model_value(&tag)
            .returning("id", ())
            .fetch_one(&conn)
            .await
            .unwrap();
        tag_ids.push(id);
    }
    for tag_id in &tag_ids {
        insert()
            .table("post_tags")
            .value("post_id", "?", (p1,))
            .value("tag_id", "?", (*tag_id,))
            .exec(&conn)
            .await
            .unwrap();
    }

    let posts: Vec<Post> = select()
        .model::<Post>()
        .relation("tags")
        .order("post.id")
        .scan_all(&conn)
        .await
        .unwrap();
    assert_eq!(posts[0].id, p1);
    let names: Vec<_> = posts[0].tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["db", "rust"]);
    assert_eq!(posts[1].id, p2);
    assert!(posts[1].tags.is_empty());
}

#[tokio::test]
async fn nested_relations_below_to_many() {
    let conn = setup().await;
    let ann = insert_user(&conn, "ann").await;
    let post = insert_post(&conn, ann.id, "p").await;
    let tag: i64 = insert()
        .model_value(&Tag {
            name: "x".into(),
            ..Default::default()
        })
        .returning("id", ())
        .fetch_one(&conn)
        .await
        .unwrap();
    insert()
        .table("post_tags")
        .value("post_id", "?", (post,))
        .value("tag_id", "?", (tag,))
        .exec(&conn)
        .await
        .unwrap();

    let u: User = select()
        .model_value(&ann)
        .where_pk()
        .relation("posts.tags")
        .scan_one(&conn)
        .await
        .unwrap();
    assert_eq!(u.posts.len(), 1);
    assert_eq!(u.posts[0].tags.len(), 1);
    assert_eq!(u.posts[0].tags[0].name, "x");
}

#[tokio::test]
async fn hooks_shape_and_veto_queries() {
    let conn = setup().await;
    for body in ["shown", "hidden"] {
        insert()
            .model_value(&Note {
                body: body.into(),
                ..Default::default()
            })
            .exec(&conn)
            .await
            .unwrap();
    }

    let before = NOTE_SELECTS.load(Ordering::SeqCst);
    let notes: Vec<Note> = select().model::<Note>().scan_all(&conn).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].body, "shown");
    assert!(NOTE_SELECTS.load(Ordering::SeqCst) > before);

    let err = delete()
        .model::<Note>()
        .allow_delete_all()
        .exec(&conn)
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Hook(_)));
    let total: i64 = select()
        .table("notes")
        .column_expr("count(*)", ())
        .fetch_one(&conn)
        .await
        .unwrap();
    assert_eq!(total, 2);
}

#[tokio::test]
async fn select_hooks_run_once_on_every_path() {
    let conn = setup().await;
    create_table::<Memo>().exec(&conn).await.unwrap();
    for body in ["shown", "hidden"] {
        insert()
            .model_value(&Memo {
                body: body.into(),
                ..Default::default()
            })
            .exec(&conn)
            .await
            .unwrap();
    }
    let calls = || {
        (
            MEMO_BEFORE.load(Ordering::SeqCst),
            MEMO_AFTER.load(Ordering::SeqCst),
        )
    };
    let memos = || select().model::<Memo>();
    assert_eq!(calls(), (0, 0));

    let bodies: Vec<String> = memos().column("body").fetch_all(&conn).await.unwrap();
    assert_eq!(bodies, ["shown"]);
    assert_eq!(calls(), (1, 1));

    assert_eq!(memos().count(&conn).await.unwrap(), 1);
    assert_eq!(calls(), (2, 2));

    assert!(!memos().eq("body", "hidden").exists(&conn).await.unwrap());
    assert_eq!(calls(), (3, 3));

    let row: HashMap<String, Value> = memos().fetch_one(&conn).await.unwrap();
    assert_eq!(row["body"], Value::Text("shown".into()));
    assert_eq!(calls(), (4, 4));

    let (items, total) = memos().scan_and_count::<Memo, _>(&conn).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(total, 1);
    assert_eq!(calls(), (5, 5));
}

#[tokio::test]
async fn rows_map_into_scalars_tuples_and_columns() {
    let conn = setup().await;
    for name in ["a", "b"] {
        insert()
            .model_value(&Tag {
                name: name.into(),
                ..Default::default()
            })
            .exec(&conn)
            .await
            .unwrap();
    }
    let q = || select().table("tags").column("id").column("name").order("id");

    let pairs: Vec<(i64, String)> = q().fetch_all(&conn).await.unwrap();
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[1].1, "b");

    let (ids, names): (Vec<i64>, Vec<String>) = q().fetch_columns(&conn).await.unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(names, ["a", "b"]);

    assert!(q().eq("name", "a").exists(&conn).await.unwrap());
    assert!(!q().eq("name", "z").exists(&conn).await.unwrap());
}

#[tokio::test]
async fn unique_violation_is_reported() {
    let conn = setup().await;
    let tag = Tag {
        name: "dup".into(),
        ..Default::default()
    };
    insert().model_value(&tag).exec(&conn).await.unwrap();
    let err = insert().model_value(&tag).exec(&conn).await.unwrap_err();
    assert!(err.is_unique_violation(), "{err}");

    let n = insert().model_value(&tag).ignore().exec(&conn).await.unwrap();
    assert_eq!(n, 0);
}

async fn tag_names(conn: &SqliteConn) -> Vec<String> {
    select()
        .table("tags")
        .column("name")
        .order("name")
        .fetch_all(conn)
        .await
        .unwrap()
}

#[tokio::test]
async fn transaction_commits_and_rolls_back() -> OrmResult<()> {
    let conn = setup().await;

    sqlweave::transaction!(&conn, tx, {
        insert()
            .model_value(&Tag {
                name: "kept".into(),
                ..Default::default()
            })
            .exec(&tx)
            .await?;
        Ok(())
    })?;

    let failed: OrmResult<()> = sqlweave::transaction!(&conn, tx, {
        insert()
            .model_value(&Tag {
                name: "lost".into(),
                ..Default::default()
            })
            .exec(&tx)
            .await?;
        Err(OrmError::Other("boom".into()))
    });
    assert!(failed.is_err());
    assert_eq!(tag_names(&conn).await, ["kept"]);
    Ok(())
}

#[tokio::test]
async fn savepoint_rolls_back_inner_work_only() -> OrmResult<()> {
    let conn = setup().await;

    sqlweave::transaction!(&conn, tx, {
        insert()
            .model_value(&Tag {
                name: "outer".into(),
                ..Default::default()
            })
            .exec(&tx)
            .await?;

        let inner: OrmResult<()> = sqlweave::savepoint!(&tx, sp, {
            insert()
                .model_value(&Tag {
                    name: "inner".into(),
                    ..Default::default()
                })
                .exec(&sp)
                .await?;
            Err(OrmError::Other("undo".into()))
        });
        assert!(inner.is_err());
        Ok(())
    })?;

    assert_eq!(tag_names(&conn).await, ["outer"]);
    Ok(())
}
