use super::*;
use crate::dialect::{MySqlDialect, PgDialect, SqliteDialect};
use crate::error::OrmError;
use crate::fragment::ident;
use crate::value::Value;
use crate::Model;
use chrono::{DateTime, Utc};

#[derive(Debug, Default, Model)]
#[orm(table = "users")]
struct User {
    #[orm(pk, autoincrement)]
    id: i64,
    name: String,
    email: Option<String>,
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
    #[orm(pk)]
    id: i64,
    author_id: i64,
    title: String,
    #[orm(belongs_to, join = "author_id=id")]
    author: Option<Box<User>>,
}

#[derive(Debug, Default, Model)]
struct Article {
    #[orm(pk, autoincrement)]
    id: i64,
    title: String,
    #[orm(default = "CURRENT_TIMESTAMP")]
    created_at: Option<DateTime<Utc>>,
    #[orm(nullzero)]
    slug: String,
}

#[derive(Debug, Default, Model)]
#[orm(table = "memberships")]
struct Membership {
    #[orm(pk)]
    group_id: i64,
    #[orm(pk)]
    user_id: i64,
    role: String,
}

fn bob() -> User {
    User {
        id: 7,
        name: "bob".into(),
        ..Default::default()
    }
}

fn article() -> Article {
    Article {
        title: "hi".into(),
        ..Default::default()
    }
}

// ==================== SELECT ====================

#[test]
fn select_clauses_render_in_order() {
    let stmt = select()
        .model::<User>()
        .column("id")
        .column("name")
        .eq("name", "bob")
        .order("name DESC")
        .limit(10)
        .offset(20)
        .build(&PgDialect)
        .unwrap();
    assert_eq!(
        stmt.sql,
        r#"SELECT "user"."id", "user"."name" FROM "users" AS "user" WHERE ("user"."name" = $1) AND ("user"."deleted_at" IS NULL) ORDER BY "name" DESC LIMIT 10 OFFSET 20"#
    );
    assert_eq!(stmt.params, vec![Value::Text("bob".into())]);
}

#[test]
fn order_tolerates_extra_whitespace() {
    let stmt = select()
        .table("users")
        .order("name  desc")
        .order(" id\tASC  NULLS   LAST ")
        .build(&PgDialect)
        .unwrap();
    assert_eq!(
        stmt.sql,
        r#"SELECT * FROM "users" ORDER BY "name" DESC, "id" ASC NULLS LAST"#
    );
}

#[test]
fn model_selects_every_column() {
    let sql = select().model::<Profile>().to_sql(&SqliteDialect).unwrap();
    assert_eq!(
        sql,
        r#"SELECT "profile"."id", "profile"."user_id", "profile"."bio" FROM "profiles" AS "profile""#
    );

    let sql = select()
        .model::<Profile>()
        .exclude_column("bio")
        .to_sql(&MySqlDialect::v8())
        .unwrap();
    assert_eq!(
        sql,
        "SELECT `profile`.`id`, `profile`.`user_id` FROM `profiles` AS `profile`"
    );
}

#[test]
fn offset_without_limit_per_dialect() {
    let q = || select().table("logs").offset(5);
    assert_eq!(
        q().to_sql(&PgDialect).unwrap(),
        r#"SELECT * FROM "logs" OFFSET 5"#
    );
    assert_eq!(
        q().to_sql(&SqliteDialect).unwrap(),
        r#"SELECT * FROM "logs" LIMIT -1 OFFSET 5"#
    );
    assert_eq!(
        q().to_sql(&MySqlDialect::v8()).unwrap(),
        "SELECT * FROM `logs` LIMIT 18446744073709551615 OFFSET 5"
    );
}

#[test]
fn where_groups_nest() {
    let stmt = select()
        .table("t")
        .where_expr("a = ?", (1,))
        .where_or_group(|q| q.where_expr("b = ?", (2,)).where_expr("c = ?", (3,)))
        .build(&PgDialect)
        .unwrap();
    assert_eq!(
        stmt.sql,
        r#"SELECT * FROM "t" WHERE (a = $1) OR ((b = $2) AND (c = $3))"#
    );
    assert_eq!(stmt.params.len(), 3);
}

#[test]
fn several_conditions_are_grouped_before_soft_delete() {
    let sql = select()
        .model::<User>()
        .column("id")
        .eq("id", 1)
        .where_or("? = ?", (ident("user.id"), 2))
        .to_sql(&PgDialect)
        .unwrap();
    assert_eq!(
        sql,
        r#"SELECT "user"."id" FROM "users" AS "user" WHERE (("user"."id" = $1) OR ("user"."id" = $2)) AND ("user"."deleted_at" IS NULL)"#
    );
}

#[test]
fn soft_delete_modes() {
    let base = || select().model::<User>().column("id");
    assert!(base()
        .to_sql(&PgDialect)
        .unwrap()
        .ends_with(r#"WHERE ("user"."deleted_at" IS NULL)"#));
    assert!(base()
        .where_deleted()
        .to_sql(&PgDialect)
        .unwrap()
        .ends_with(r#"WHERE ("user"."deleted_at" IS NOT NULL)"#));
    assert_eq!(
        base().where_all_with_deleted().to_sql(&PgDialect).unwrap(),
        r#"SELECT "user"."id" FROM "users" AS "user""#
    );
}

#[test]
fn empty_in_list_matches_nothing() {
    let stmt = select()
        .table("t")
        .in_list::<i64>("id", vec![])
        .build(&SqliteDialect)
        .unwrap();
    assert_eq!(stmt.sql, r#"SELECT * FROM "t" WHERE ("id" IN (NULL))"#);
    assert!(stmt.params.is_empty());
}

#[test]
fn count_wraps_grouped_queries() {
    let sql = select()
        .model::<User>()
        .column("name")
        .group("name")
        .order("name")
        .build_count(&PgDialect)
        .unwrap()
        .sql;
    assert_eq!(
        sql,
        r#"SELECT count(*) FROM (SELECT "user"."name" FROM "users" AS "user" WHERE ("user"."deleted_at" IS NULL) GROUP BY "user"."name") AS _count_wrapper"#
    );

    let sql = select()
        .model::<User>()
        .order("id")
        .limit(5)
        .offset(10)
        .build_count(&PgDialect)
        .unwrap()
        .sql;
    assert_eq!(
        sql,
        r#"SELECT count(*) FROM "users" AS "user" WHERE ("user"."deleted_at" IS NULL)"#
    );
}

#[test]
fn set_operations_parenthesize_where_allowed() {
    let q = || {
        select()
            .table("a")
            .column("x")
            .union_all(select().table("b").column("x"))
    };
    assert_eq!(
        q().to_sql(&PgDialect).unwrap(),
        r#"(SELECT "x" FROM "a") UNION ALL (SELECT "x" FROM "b")"#
    );
    assert_eq!(
        q().to_sql(&SqliteDialect).unwrap(),
        r#"SELECT "x" FROM "a" UNION ALL SELECT "x" FROM "b""#
    );

    let err = select()
        .table("a")
        .intersect(select().table("b"))
        .to_sql(&MySqlDialect::v5())
        .unwrap_err();
    assert!(matches!(err, OrmError::Unsupported { .. }));
}

#[test]
fn cte_renders_inline_and_needs_support() {
    let q = || {
        select()
            .with("recent", select().table("events").where_expr("ts > ?", (5,)))
            .table("recent")
    };
    assert_eq!(
        q().to_inline_sql(&PgDialect).unwrap(),
        r#"WITH "recent" AS (SELECT * FROM "events" WHERE (ts > 5)) SELECT * FROM "recent""#
    );
    assert!(matches!(
        q().to_sql(&MySqlDialect::v5()),
        Err(OrmError::Unsupported { .. })
    ));
}

#[test]
fn dialect_only_clauses_are_rejected() {
    let err = select()
        .table("t")
        .distinct_on("a", ())
        .to_sql(&SqliteDialect)
        .unwrap_err();
    assert!(matches!(err, OrmError::Unsupported { .. }));

    let err = select()
        .table("t")
        .lock("UPDATE", ())
        .to_sql(&SqliteDialect)
        .unwrap_err();
    assert!(matches!(err, OrmError::Unsupported { .. }));

    assert_eq!(
        select().table("t").lock("UPDATE", ()).to_sql(&PgDialect).unwrap(),
        r#"SELECT * FROM "t" FOR UPDATE"#
    );
}

#[test]
fn join_on_requires_a_join() {
    let err = select()
        .table("a")
        .join_on("x = y", ())
        .where_expr("? = ?", (1,))
        .to_sql(&PgDialect)
        .unwrap_err();
    assert!(err.to_string().contains("query has no joins"), "{err}");

    let sql = select()
        .table("a")
        .join("LEFT JOIN b", ())
        .join_on("b.a_id = a.id", ())
        .join_on_or("b.x = ?", (1,))
        .to_sql(&PgDialect)
        .unwrap();
    assert_eq!(
        sql,
        r#"SELECT * FROM "a" LEFT JOIN b ON (b.a_id = a.id) OR (b.x = $1)"#
    );
}

#[test]
fn argument_count_mismatch_is_an_error() {
    let err = select()
        .table("a")
        .where_expr("x = ? AND y = ?", (1,))
        .to_sql(&PgDialect)
        .unwrap_err();
    assert!(matches!(err, OrmError::Build(_)));
}

#[test]
fn no_table_is_an_error() {
    let err = update().set("x = 1", ()).to_sql(&PgDialect).unwrap_err();
    assert!(err.to_string().contains("no table"), "{err}");
}

// ==================== Relations ====================

#[test]
fn unknown_relation_is_a_config_error() {
    let err = select()
        .model::<User>()
        .relation("nope")
        .to_sql(&PgDialect)
        .unwrap_err();
    match err {
        OrmError::Config(msg) => assert_eq!(msg, r#"User does not have relation="nope""#),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn to_one_relation_is_joined() {
    let sql = select()
        .model::<Post>()
        .relation("author")
        .to_sql(&PgDialect)
        .unwrap();
    assert_eq!(
        sql,
        concat!(
            r#"SELECT "post"."id", "post"."author_id", "post"."title", "#,
            r#""author"."id" AS "author__id", "author"."name" AS "author__name", "#,
            r#""author"."email" AS "author__email", "author"."deleted_at" AS "author__deleted_at" "#,
            r#"FROM "posts" AS "post" "#,
            r#"LEFT JOIN "users" AS "author" ON ("author"."id" = "post"."author_id") "#,
            r#"AND ("author"."deleted_at" IS NULL)"#,
        )
    );
}

#[test]
fn nested_to_one_relations_use_path_aliases() {
    let sql = select()
        .model::<Post>()
        .column("id")
        .relation("author._")
        .relation("author.profile")
        .to_sql(&PgDialect)
        .unwrap();
    assert_eq!(
        sql,
        concat!(
            r#"SELECT "post"."id", "#,
            r#""author__profile"."id" AS "author__profile__id", "#,
            r#""author__profile"."user_id" AS "author__profile__user_id", "#,
            r#""author__profile"."bio" AS "author__profile__bio" "#,
            r#"FROM "posts" AS "post" "#,
            r#"LEFT JOIN "users" AS "author" ON ("author"."id" = "post"."author_id") "#,
            r#"AND ("author"."deleted_at" IS NULL) "#,
            r#"LEFT JOIN "profiles" AS "author__profile" "#,
            r#"ON ("author__profile"."user_id" = "author"."id")"#,
        )
    );
}

#[test]
fn relation_apply_narrows_the_join() {
    let stmt = select()
        .model::<Post>()
        .relation_with("author", |q| q.column("name").eq("name", "ann"))
        .build(&PgDialect)
        .unwrap();
    assert_eq!(
        stmt.sql,
        concat!(
            r#"SELECT "post"."id", "post"."author_id", "post"."title", "#,
            r#""author"."name" AS "author__name" "#,
            r#"FROM "posts" AS "post" "#,
            r#"LEFT JOIN "users" AS "author" ON ("author"."id" = "post"."author_id") "#,
            r#"AND ("author"."deleted_at" IS NULL) AND (("author"."name" = $1))"#,
        )
    );
    assert_eq!(stmt.params, vec![Value::Text("ann".into())]);
}

#[test]
fn including_deleted_rows_also_includes_deleted_relations() {
    let sql = select()
        .model::<Post>()
        .column("id")
        .relation("author._")
        .where_all_with_deleted()
        .to_sql(&PgDialect)
        .unwrap();
    assert_eq!(
        sql,
        r#"SELECT "post"."id" FROM "posts" AS "post" LEFT JOIN "users" AS "author" ON ("author"."id" = "post"."author_id")"#
    );
}

#[test]
fn to_many_relations_are_not_joined() {
    let sql = select()
        .model::<User>()
        .column("id")
        .relation("posts")
        .where_all_with_deleted()
        .to_sql(&PgDialect)
        .unwrap();
    assert_eq!(sql, r#"SELECT "user"."id" FROM "users" AS "user""#);
}

// ==================== INSERT ====================

#[test]
fn insert_zero_defaults_per_dialect() {
    let a = article();
    assert_eq!(
        insert().model_value(&a).to_sql(&PgDialect).unwrap(),
        r#"INSERT INTO "articles" ("id", "title", "created_at", "slug") VALUES (DEFAULT, $1, DEFAULT, NULL)"#
    );
    assert_eq!(
        insert().model_value(&a).to_sql(&SqliteDialect).unwrap(),
        r#"INSERT INTO "articles" ("id", "title", "created_at", "slug") VALUES (NULL, ?, CURRENT_TIMESTAMP, NULL)"#
    );
    assert_eq!(
        insert().model_value(&a).to_sql(&MySqlDialect::v8()).unwrap(),
        "INSERT INTO `articles` (`id`, `title`, `created_at`, `slug`) VALUES (DEFAULT, ?, DEFAULT, NULL)"
    );
}

#[test]
fn insert_several_values() {
    let rows = [article(), Article { id: 3, slug: "s".into(), ..article() }];
    let stmt = insert().model_values(&rows).build(&PgDialect).unwrap();
    assert_eq!(
        stmt.sql,
        r#"INSERT INTO "articles" ("id", "title", "created_at", "slug") VALUES (DEFAULT, $1, DEFAULT, NULL), ($2, $3, DEFAULT, $4)"#
    );
    assert_eq!(
        stmt.params,
        vec![
            Value::Text("hi".into()),
            Value::Int(3),
            Value::Text("hi".into()),
            Value::Text("s".into()),
        ]
    );
}

#[test]
fn insert_value_overrides_a_column() {
    let sql = insert()
        .model_value(&article())
        .column("title")
        .column("created_at")
        .value("created_at", "now()", ())
        .to_sql(&PgDialect)
        .unwrap();
    assert_eq!(
        sql,
        r#"INSERT INTO "articles" ("title", "created_at") VALUES ($1, now())"#
    );
}

#[test]
fn insert_conflict_clauses() {
    let sql = insert()
        .model_value(&article())
        .on_conflict("(id) DO UPDATE", ())
        .returning("id", ())
        .to_sql(&PgDialect)
        .unwrap();
    assert!(
        sql.ends_with(concat!(
            r#"ON CONFLICT (id) DO UPDATE SET "title" = EXCLUDED."title", "#,
            r#""created_at" = EXCLUDED."created_at", "slug" = EXCLUDED."slug" RETURNING id"#,
        )),
        "{sql}"
    );

    let sql = insert()
        .model_value(&article())
        .on_duplicate_key_update()
        .to_sql(&MySqlDialect::v8())
        .unwrap();
    assert!(
        sql.ends_with(
            "ON DUPLICATE KEY UPDATE `title` = VALUES(`title`), `created_at` = VALUES(`created_at`), `slug` = VALUES(`slug`)"
        ),
        "{sql}"
    );

    let err = insert()
        .model_value(&article())
        .on_conflict("DO NOTHING", ())
        .to_sql(&MySqlDialect::v8())
        .unwrap_err();
    assert!(matches!(err, OrmError::Unsupported { .. }));
}

#[test]
fn insert_ignore_per_dialect() {
    let q = || insert().table("tags").value("name", "?", ("x",)).ignore();
    assert_eq!(
        q().to_sql(&MySqlDialect::v8()).unwrap(),
        "INSERT IGNORE INTO `tags` (`name`) VALUES (?)"
    );
    assert_eq!(
        q().to_sql(&PgDialect).unwrap(),
        r#"INSERT INTO "tags" ("name") VALUES ($1) ON CONFLICT DO NOTHING"#
    );
}

#[test]
fn returning_needs_support() {
    let err = insert()
        .model_value(&article())
        .returning("*", ())
        .to_sql(&MySqlDialect::v8())
        .unwrap_err();
    assert!(matches!(err, OrmError::Unsupported { .. }));
}

// ==================== UPDATE ====================

#[test]
fn update_sets_model_columns_by_pk() {
    let stmt = update()
        .model_value(&bob())
        .where_pk()
        .build(&PgDialect)
        .unwrap();
    assert_eq!(
        stmt.sql,
        r#"UPDATE "users" AS "user" SET "name" = $1, "email" = $2, "deleted_at" = $3 WHERE ("user"."id" = $4) AND ("user"."deleted_at" IS NULL)"#
    );
    assert_eq!(
        stmt.params,
        vec![
            Value::Text("bob".into()),
            Value::Null,
            Value::Null,
            Value::Int(7)
        ]
    );
}

#[test]
fn update_omit_zero_and_explicit_set() {
    let sql = update()
        .model_value(&bob())
        .omit_zero()
        .where_pk()
        .to_sql(&SqliteDialect)
        .unwrap();
    assert_eq!(
        sql,
        r#"UPDATE "users" AS "user" SET "name" = ? WHERE ("user"."id" = ?) AND ("user"."deleted_at" IS NULL)"#
    );

    let stmt = update()
        .table("counters")
        .set("hits = hits + ?", (1,))
        .set_column("label", "x")
        .eq("id", 3)
        .build(&PgDialect)
        .unwrap();
    assert_eq!(
        stmt.sql,
        r#"UPDATE "counters" SET hits = hits + $1, "label" = $2 WHERE ("id" = $3)"#
    );
}

#[test]
fn update_several_values_needs_set() {
    let err = update()
        .model_value(&bob())
        .model_value(&bob())
        .where_pk()
        .to_sql(&PgDialect)
        .unwrap_err();
    assert!(matches!(err, OrmError::Build(_)));
}

#[test]
fn where_pk_needs_a_value() {
    let err = select()
        .model::<User>()
        .where_pk()
        .to_sql(&PgDialect)
        .unwrap_err();
    assert!(err.to_string().contains("requires a model value"), "{err}");
}

// ==================== DELETE ====================

#[test]
fn delete_without_where_is_refused() {
    let err = delete().model::<Profile>().to_sql(&PgDialect).unwrap_err();
    assert!(err.to_string().contains("allow_delete_all"), "{err}");

    assert_eq!(
        delete()
            .model::<Profile>()
            .allow_delete_all()
            .to_sql(&PgDialect)
            .unwrap(),
        r#"DELETE FROM "profiles" AS "profile""#
    );
}

#[test]
fn delete_of_soft_delete_model_updates() {
    let stmt = delete()
        .model_value(&bob())
        .where_pk()
        .build(&PgDialect)
        .unwrap();
    assert_eq!(
        stmt.sql,
        r#"UPDATE "users" AS "user" SET "deleted_at" = $1 WHERE ("user"."id" = $2) AND ("user"."deleted_at" IS NULL)"#
    );
    assert!(matches!(stmt.params[0], Value::Timestamp(_)));

    let sql = delete()
        .model_value(&bob())
        .where_pk()
        .force_delete()
        .to_sql(&PgDialect)
        .unwrap();
    assert_eq!(sql, r#"DELETE FROM "users" AS "user" WHERE ("user"."id" = $1)"#);

    let sql = delete()
        .model_value(&bob())
        .where_pk()
        .force_delete()
        .to_sql(&MySqlDialect::v8())
        .unwrap();
    assert_eq!(sql, "DELETE `user` FROM `users` AS `user` WHERE (`user`.`id` = ?)");
}

#[test]
fn composite_pk_uses_tuple_in() {
    let a = Membership {
        group_id: 1,
        user_id: 2,
        ..Default::default()
    };
    let b = Membership {
        group_id: 1,
        user_id: 3,
        ..Default::default()
    };
    let stmt = delete()
        .model_value(&a)
        .model_value(&b)
        .where_pk()
        .build(&PgDialect)
        .unwrap();
    assert_eq!(
        stmt.sql,
        r#"DELETE FROM "memberships" AS "membership" WHERE (("membership"."group_id", "membership"."user_id") IN (($1, $2), ($3, $4)))"#
    );
    assert_eq!(
        stmt.params,
        vec![Value::Int(1), Value::Int(2), Value::Int(1), Value::Int(3)]
    );

    let sql = select()
        .model_value(&a)
        .where_pk()
        .to_sql(&PgDialect)
        .unwrap();
    assert!(
        sql.ends_with(r#"WHERE ("membership"."group_id" = $1 AND "membership"."user_id" = $2)"#),
        "{sql}"
    );
}

// ==================== DDL ====================

#[test]
fn create_table_per_dialect() {
    assert_eq!(
        create_table::<Article>().to_sql(&PgDialect).unwrap(),
        r#"CREATE TABLE "articles" ("id" BIGSERIAL, "title" VARCHAR NOT NULL, "created_at" TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP, "slug" VARCHAR NOT NULL, PRIMARY KEY ("id"))"#
    );
    assert_eq!(
        create_table::<Profile>()
            .if_not_exists()
            .to_sql(&SqliteDialect)
            .unwrap(),
        r#"CREATE TABLE IF NOT EXISTS "profiles" ("id" INTEGER, "user_id" INTEGER NOT NULL, "bio" TEXT NOT NULL, PRIMARY KEY ("id"))"#
    );
    assert_eq!(
        drop_table::<Profile>().if_exists().to_sql(&MySqlDialect::v8()).unwrap(),
        "DROP TABLE IF EXISTS `profiles`"
    );
}
