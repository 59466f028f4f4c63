#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Entity services with non-default paths, verbs or payload shapes.

mod common;

use common::{FakeKong, ROOT, client};
use http::Method;
use kong_admin::{
    Admin, Client, CustomEntity, EntityDescriptor, FieldEncoding, KongError, Operation, Plugin, PluginScope,
    RbacEndpointPermission, RbacEntityPermission, RbacRole, RegistryError, Target,
};
use serde_json::{Map, json};

fn role(name: &str) -> Option<RbacRole> {
    Some(RbacRole {
        name: Some(name.to_owned()),
        ..RbacRole::default()
    })
}

#[tokio::test]
async fn endpoint_permission_actions_are_joined_on_write() {
    let fake = FakeKong::new();
    let client = client(&fake);

    let permission = RbacEndpointPermission {
        workspace: Some("default".to_owned()),
        endpoint: Some("/services".to_owned()),
        actions: vec!["read".to_owned(), "create".to_owned()],
        role: role("ops"),
        ..RbacEndpointPermission::default()
    };
    let created = client.rbac_endpoint_permissions().create(&permission).await.unwrap();

    assert_eq!(created.actions, ["read", "create"]);
    assert_eq!(created.role.and_then(|r| r.id).as_deref(), Some("role-1"));

    let requests = fake.requests();
    assert_eq!(requests[0].method, Method::POST);
    assert!(requests[0].url.starts_with(&format!("{ROOT}/rbac/roles/ops/endpoints?")));
    assert_eq!(requests[0].json()["actions"], "read,create");
    assert!(requests[0].json().get("role").is_none());
    assert!(requests[1].url.starts_with(&format!("{ROOT}/rbac/roles/ops?")));
}

#[tokio::test]
async fn entity_permission_paths() {
    let fake = FakeKong::new();
    let client = client(&fake);
    let service = client.rbac_entity_permissions();

    let permission = RbacEntityPermission {
        entity_id: Some("e1".to_owned()),
        entity_type: Some("services".to_owned()),
        actions: vec!["delete".to_owned()],
        role: role("ops"),
        ..RbacEntityPermission::default()
    };
    service.update(&permission).await.unwrap();
    service.delete("ops", "e1").await.unwrap();
    assert!(service.list_all("ops").await.unwrap().is_empty());

    let requests = fake.requests();
    assert_eq!(requests[0].method, Method::PATCH);
    assert!(requests[0].url.starts_with(&format!("{ROOT}/rbac/roles/ops/entities/e1?")));
    assert_eq!(requests[0].json()["actions"], "delete");
    let delete = requests.iter().find(|r| r.method == Method::DELETE).unwrap();
    assert!(delete.url.starts_with(&format!("{ROOT}/rbac/roles/ops/entities/e1?")));

    let missing_role = RbacEntityPermission {
        role: None,
        ..permission
    };
    fake.clear();
    assert!(matches!(
        service.create(&missing_role).await,
        Err(KongError::InvalidArgument(_))
    ));
    assert!(fake.requests().is_empty());
}

#[tokio::test]
async fn post_only_entities_never_put() {
    let fake = FakeKong::new();
    let client = client(&fake);

    let admin = Admin {
        id: Some("a1".to_owned()),
        email: Some("ops@example.com".to_owned()),
        ..Admin::default()
    };
    client.admins().create(&admin).await.unwrap();

    let target = Target {
        id: Some("t1".to_owned()),
        target: Some("10.0.0.1:80".to_owned()),
        ..Target::default()
    };
    client.targets().create("u1", &target).await.unwrap();

    let requests = fake.requests();
    assert_eq!(requests[0].method, Method::POST);
    assert!(requests[0].url.starts_with(&format!("{ROOT}/admins?")));
    assert_eq!(requests[1].method, Method::POST);
    assert!(requests[1].url.starts_with(&format!("{ROOT}/upstreams/u1/targets?")));
}

#[tokio::test]
async fn admin_one_shot_operations() {
    let fake = FakeKong::new();
    let client = client(&fake);
    let admins = client.admins();

    let invited = admins
        .invite(&Admin {
            email: Some("new@example.com".to_owned()),
            username: Some("new".to_owned()),
            ..Admin::default()
        })
        .await
        .unwrap();
    assert_eq!(invited.email.as_deref(), Some("new@example.com"));
    admins.delete_roles("new", &["read-only", "auditor"]).await.unwrap();

    let requests = fake.requests();
    assert!(requests[0].url.contains("send_email=true"));
    assert_eq!(requests[1].method, Method::DELETE);
    assert!(requests[1].url.starts_with(&format!("{ROOT}/admins/new/roles?")));
    assert_eq!(requests[1].json(), json!({"roles": "read-only,auditor"}));

    fake.clear();
    let incomplete = Admin {
        username: Some("new".to_owned()),
        ..Admin::default()
    };
    assert!(matches!(
        admins.register_credentials(&incomplete).await,
        Err(KongError::InvalidArgument(_))
    ));
    assert!(matches!(
        admins.update_roles::<&str>("new", &[]).await,
        Err(KongError::InvalidArgument(_))
    ));
    assert!(matches!(
        admins.update_roles("new", &["", "  "]).await,
        Err(KongError::InvalidArgument(_))
    ));
    assert!(matches!(
        admins.delete_roles("new", &[""]).await,
        Err(KongError::InvalidArgument(_))
    ));
    assert!(fake.requests().is_empty());
}

#[tokio::test]
async fn rbac_user_roles_are_joined() {
    let fake = FakeKong::new();
    let client = client(&fake);

    client
        .rbac_users()
        .delete_roles("u1", &["admin", "read-only"])
        .await
        .unwrap();

    let requests = fake.requests();
    let request = &requests[0];
    assert_eq!(request.method, Method::DELETE);
    assert!(request.url.starts_with(&format!("{ROOT}/rbac/users/u1/roles?")));
    assert_eq!(request.json(), json!({"roles": "admin,read-only"}));
}

#[tokio::test]
async fn consumer_group_override_and_scoped_plugins() {
    let fake = FakeKong::new();
    let client = client(&fake);

    let mut config = Map::new();
    config.insert("limit".to_owned(), json!([10]));
    config.insert("window_size".to_owned(), json!([60]));
    let applied = client
        .consumer_groups()
        .upsert_rate_limiting_override("gold", config.clone())
        .await
        .unwrap();
    assert_eq!(applied.config, Some(config));

    let plugin = Plugin {
        name: Some("key-auth".to_owned()),
        ..Plugin::default()
    };
    client
        .plugins()
        .create_for(PluginScope::Service("s1"), &plugin)
        .await
        .unwrap();

    let requests = fake.requests();
    assert_eq!(requests[0].method, Method::PUT);
    assert!(requests[0].url.starts_with(&format!(
        "{ROOT}/consumer_groups/gold/overrides/plugins/rate-limiting-advanced?"
    )));
    assert_eq!(requests[1].method, Method::POST);
    assert!(requests[1].url.starts_with(&format!("{ROOT}/services/s1/plugins?")));
}

#[tokio::test]
async fn custom_entity_uses_registered_descriptor() {
    let fake = FakeKong::new();
    let client = Client::builder()
        .base_url(ROOT)
        .transport(fake.clone())
        .register(
            EntityDescriptor::new("grant", "/custom/${group}/grants")
                .identifier("group")
                .field("actions", FieldEncoding::CommaJoined),
        )
        .build()
        .unwrap();
    let custom = client.custom_entities();

    let grant = CustomEntity::new("grant")
        .with_reference("group", "g 1")
        .with_field("name", "deploy")
        .with_field("actions", json!(["read", "write"]));
    let created = custom.create(&grant).await.unwrap();
    assert_eq!(created.field("id"), Some(&json!("generated-1")));
    assert_eq!(created.references, grant.references);

    let requests = fake.requests();
    let request = &requests[0];
    assert_eq!(request.method, Method::POST);
    assert!(request.url.starts_with(&format!("{ROOT}/custom/g%201/grants?")));
    assert_eq!(request.json()["actions"], "read,write");

    fake.clear();
    let unbound = CustomEntity::new("grant").with_field("name", "deploy");
    assert!(matches!(
        custom.create(&unbound).await,
        Err(KongError::InvalidArgument(_))
    ));
    assert!(matches!(
        custom.create(&CustomEntity::new("nope")).await,
        Err(KongError::Registry(RegistryError::NotRegistered(_)))
    ));
    assert!(matches!(
        custom.get(&grant).await,
        Err(KongError::InvalidArgument(_))
    ));
    assert!(fake.requests().is_empty());
}

#[tokio::test]
async fn custom_list_uses_the_descriptor_verb() {
    let fake = FakeKong::new();
    let client = Client::builder()
        .base_url(ROOT)
        .transport(fake.clone())
        .register(
            EntityDescriptor::new("finder", "/custom/${group}/search")
                .identifier("group")
                .verb(Operation::List, Method::POST),
        )
        .build()
        .unwrap();

    let template = CustomEntity::new("finder").with_reference("group", "g1");
    let (page, next) = client.custom_entities().list(&template, None).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].field("id"), Some(&json!("found-1")));
    assert!(next.is_none());
    assert_eq!(client.custom_entities().list_all(&template).await.unwrap().len(), 1);

    let requests = fake.requests();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(request.method, Method::POST);
        assert!(request.url.starts_with(&format!("{ROOT}/custom/g1/search?")));
    }
}

#[tokio::test]
async fn builtin_credential_kinds_are_registered() {
    let fake = FakeKong::new();
    let client = client(&fake);

    let key = CustomEntity::new("key-auth")
        .with_reference("consumer_id", "c1")
        .with_field("id", "k1")
        .with_field("key", "secret");
    client.custom_entities().create(&key).await.unwrap();
    client.custom_entities().delete(&key).await.unwrap();

    let requests = fake.requests();
    assert_eq!(requests[0].method, Method::PUT);
    assert!(requests[0].url.starts_with(&format!("{ROOT}/consumers/c1/key-auth/k1?")));
    assert_eq!(requests[1].method, Method::DELETE);
    assert!(requests[1].url.starts_with(&format!("{ROOT}/consumers/c1/key-auth/k1?")));
}

#[test]
fn duplicate_registration_fails_at_build() {
    let result = Client::builder()
        .base_url(ROOT)
        .transport(FakeKong::new())
        .register(EntityDescriptor::new("acl", "/acls"))
        .build();
    assert!(matches!(
        result,
        Err(KongError::Registry(RegistryError::AlreadyRegistered(_)))
    ));
}
