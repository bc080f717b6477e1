use serde_json::Value;
use uuid::Uuid;

use super::AssetInstanceService;
use crate::error::AssetError;
use crate::repository::ConfirmationCommit;
use crate::types::{AssetDefinition, AssetInstance, AssetInstanceCreated};

/// Outcome of reconciling one ledger confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub instance_id: Uuid,
    /// Pending rivals that lost the race for the same unique content
    pub conflicted: Vec<Uuid>,
}

impl AssetInstanceService {
    /// Converge the local record of an instance onto a ledger confirmation.
    ///
    /// The first confirmation to arrive for a piece of unique content wins.
    /// Pending rivals are marked conflicted in the same repository commit that
    /// confirms the winner, so a failure while resolving payloads leaves every
    /// record untouched.
    pub async fn reconcile_confirmation_event(
        &self,
        event: &AssetInstanceCreated,
    ) -> Result<Reconciliation, AssetError> {
        let instance_id = event.asset_instance_id;
        let existing = self.repository.get_by_id(instance_id).await?;
        if existing.as_ref().map_or(false, |instance| instance.confirmed) {
            return Err(AssetError::DuplicateEvent(instance_id));
        }

        let definition = self
            .definition(event.asset_definition_id)
            .await?
            .ok_or(AssetError::UnknownDefinition(event.asset_definition_id))?;

        if definition.is_content_unique {
            self.check_confirmed_rivals(event).await?;
        }

        let description = self
            .resolve_description(&definition, event, existing.as_ref())
            .await?;
        let content = self
            .resolve_content(&definition, event, existing.as_ref())
            .await?;

        let instance = AssetInstance {
            id: instance_id,
            author: event.author.clone(),
            asset_definition_id: event.asset_definition_id,
            description_hash: event.description_hash.clone(),
            description,
            content_hash: event.content_hash.clone(),
            content,
            confirmed: true,
            conflicted: false,
            timestamp: event.timestamp,
        };

        match self
            .repository
            .commit_confirmation(instance, definition.is_content_unique)
            .await?
        {
            ConfirmationCommit::Committed { conflicted } => {
                for rival in &conflicted {
                    log::warn!(
                        "Asset instance {} conflicts with confirmed {} on {}",
                        rival,
                        instance_id,
                        event.content_hash
                    );
                }
                log::info!(
                    "Confirmed asset instance {} of {}{}",
                    instance_id,
                    definition.name,
                    if existing.is_some() { "" } else { " (first seen on ledger)" }
                );
                Ok(Reconciliation {
                    instance_id,
                    conflicted,
                })
            }
            ConfirmationCommit::AlreadyConfirmed => Err(AssetError::DuplicateEvent(instance_id)),
            ConfirmationCommit::RivalConfirmed { rival } => Err(content_conflict(event, rival)),
        }
    }

    async fn check_confirmed_rivals(&self, event: &AssetInstanceCreated) -> Result<(), AssetError> {
        let holders = self
            .repository
            .list_by_definition_and_content_hash(event.asset_definition_id, &event.content_hash)
            .await?;
        match holders
            .iter()
            .find(|other| other.id != event.asset_instance_id && other.confirmed)
        {
            Some(rival) => Err(content_conflict(event, rival.id)),
            None => Ok(()),
        }
    }

    async fn resolve_description(
        &self,
        definition: &AssetDefinition,
        event: &AssetInstanceCreated,
        existing: Option<&AssetInstance>,
    ) -> Result<Option<Value>, AssetError> {
        let schema = match &definition.description_schema {
            Some(schema) => schema,
            None => return Ok(None),
        };
        let hash = event
            .description_hash
            .as_deref()
            .ok_or(AssetError::MissingDescription(event.asset_instance_id))?;

        if let Some(cached) = existing.and_then(|instance| {
            match (&instance.description_hash, &instance.description) {
                (Some(cached_hash), Some(description)) if cached_hash == hash => Some(description),
                _ => None,
            }
        }) {
            return Ok(Some(cached.clone()));
        }

        let description = self.fetch_json(hash).await?;
        self.validate(schema, &description, "Description")?;
        Ok(Some(description))
    }

    async fn resolve_content(
        &self,
        definition: &AssetDefinition,
        event: &AssetInstanceCreated,
        existing: Option<&AssetInstance>,
    ) -> Result<Option<Value>, AssetError> {
        let schema = match &definition.content_schema {
            Some(schema) => schema,
            None => return Ok(None),
        };

        if let Some(cached) = existing
            .filter(|instance| instance.content_hash == event.content_hash)
            .and_then(|instance| instance.content.as_ref())
        {
            return Ok(Some(cached.clone()));
        }
        if definition.is_content_private {
            return Ok(None);
        }

        let content = self.fetch_json(&event.content_hash).await?;
        self.validate(schema, &content, "Content")?;
        Ok(Some(content))
    }
}

fn content_conflict(event: &AssetInstanceCreated, rival: Uuid) -> AssetError {
    AssetError::ContentConflict(format!(
        "{} and {} are both confirmed for {}",
        event.asset_instance_id, rival, event.content_hash
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use crate::content::{sha256_hex, to_canonical_json};
    use crate::error::ErrorKind;
    use crate::instances::testing::Fixture;
    use crate::repository::InstanceRepository;
    use crate::storage::PublicContentStore;
    use crate::types::{AssetDefinition, AssetInstanceCreated, InstanceState};

    fn x_schema() -> serde_json::Value {
        json!({"type": "object", "required": ["x"]})
    }

    fn unique_points() -> AssetDefinition {
        AssetDefinition::new("points")
            .confirmed()
            .with_content_schema(x_schema())
            .unique_content()
    }

    fn make_event(definition: Uuid, content_hash: &str, timestamp: u64) -> AssetInstanceCreated {
        AssetInstanceCreated {
            asset_instance_id: Uuid::new_v4(),
            asset_definition_id: definition,
            author: "0xremote".into(),
            description_hash: None,
            content_hash: content_hash.into(),
            timestamp,
        }
    }

    /// Publish a JSON payload straight to the backing store, bypassing the counters
    async fn publish(fixture: &Fixture, value: &serde_json::Value) -> String {
        let bytes = to_canonical_json(value).unwrap();
        fixture.store.inner.put(bytes.clone()).await.unwrap();
        sha256_hex(&bytes)
    }

    #[tokio::test]
    async fn test_confirms_optimistic_record_from_cache() {
        let mut fixture = Fixture::new().await;
        let definition = fixture
            .define(
                AssetDefinition::new("described")
                    .confirmed()
                    .with_description_schema(json!({"type": "object"}))
                    .with_content_schema(x_schema()),
            )
            .await;

        let id = fixture
            .service
            .create_structured("0xme", definition.id, Some(json!({"t": 1})), json!({"x": 1}), true)
            .await
            .unwrap();
        let event = fixture.next_event().await;
        let gets_before = fixture.store.gets();

        let outcome = fixture.service.reconcile_confirmation_event(&event).await.unwrap();
        assert_eq!(outcome.instance_id, id);
        assert!(outcome.conflicted.is_empty());
        assert_eq!(fixture.store.gets(), gets_before);

        let instance = fixture.service.get_instance(id).await.unwrap();
        assert_eq!(instance.state(), InstanceState::Confirmed);
        assert_eq!(instance.timestamp, event.timestamp);
        assert_eq!(instance.description, Some(json!({"t": 1})));
        assert_eq!(instance.content, Some(json!({"x": 1})));
    }

    #[tokio::test]
    async fn test_unseen_instance_is_fetched_and_confirmed() {
        let fixture = Fixture::new().await;
        let definition = fixture
            .define(AssetDefinition::new("points").confirmed().with_content_schema(x_schema()))
            .await;
        let hash = publish(&fixture, &json!({"x": 7})).await;

        let event = make_event(definition.id, &hash, 1_700_000_000);
        fixture.service.reconcile_confirmation_event(&event).await.unwrap();

        let instance = fixture
            .repository
            .get_by_id(event.asset_instance_id)
            .await
            .unwrap()
            .unwrap();
        assert!(instance.confirmed);
        assert_eq!(instance.author, "0xremote");
        assert_eq!(instance.content, Some(json!({"x": 7})));
        assert_eq!(fixture.store.gets(), 1);
    }

    #[tokio::test]
    async fn test_first_confirmation_wins_the_race() {
        let mut fixture = Fixture::new().await;
        let definition = fixture.define(unique_points()).await;

        let first = fixture
            .service
            .create_structured("a", definition.id, None, json!({"x": 1}), true)
            .await
            .unwrap();
        let first_event = fixture.next_event().await;
        let second = fixture
            .service
            .create_structured("b", definition.id, None, json!({"x": 1}), true)
            .await
            .unwrap();
        let second_event = fixture.next_event().await;

        // The later creation is confirmed first
        let outcome = fixture
            .service
            .reconcile_confirmation_event(&second_event)
            .await
            .unwrap();
        assert_eq!(outcome.conflicted, vec![first]);

        let winner = fixture.service.get_instance(second).await.unwrap();
        let loser = fixture.service.get_instance(first).await.unwrap();
        assert_eq!(winner.state(), InstanceState::Confirmed);
        assert_eq!(loser.state(), InstanceState::Conflicted);
        assert_eq!(loser.timestamp, second_event.timestamp);

        let err = fixture
            .service
            .reconcile_confirmation_event(&first_event)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContentConflict);
        assert!(err.is_fatal());
        assert_eq!(
            fixture.service.get_instance(first).await.unwrap().state(),
            InstanceState::Conflicted
        );
    }

    #[tokio::test]
    async fn test_confirmed_content_blocks_later_creation() {
        let mut fixture = Fixture::new().await;
        let definition = fixture.define(unique_points()).await;

        fixture
            .service
            .create_structured("a", definition.id, None, json!({"x": 1}), true)
            .await
            .unwrap();
        let event = fixture.next_event().await;
        fixture.service.reconcile_confirmation_event(&event).await.unwrap();
        let before = fixture.repository.len().await;

        let err = fixture
            .service
            .create_structured("b", definition.id, None, json!({"x": 1}), true)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(fixture.repository.len().await, before);
        assert_eq!(fixture.ledger.submissions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_confirmation_is_fatal() {
        let mut fixture = Fixture::new().await;
        let definition = fixture
            .define(AssetDefinition::new("points").confirmed().with_content_schema(x_schema()))
            .await;

        let id = fixture
            .service
            .create_structured("a", definition.id, None, json!({"x": 1}), true)
            .await
            .unwrap();
        let event = fixture.next_event().await;
        fixture.service.reconcile_confirmation_event(&event).await.unwrap();
        let confirmed = fixture.service.get_instance(id).await.unwrap();

        let err = fixture
            .service
            .reconcile_confirmation_event(&event)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateEvent);
        assert!(err.is_fatal());
        assert_eq!(fixture.service.get_instance(id).await.unwrap(), confirmed);
    }

    #[tokio::test]
    async fn test_unknown_definition_is_fatal() {
        let fixture = Fixture::new().await;
        let event = make_event(Uuid::new_v4(), "0xaa", 1);

        let err = fixture
            .service
            .reconcile_confirmation_event(&event)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownDefinition);
        assert!(fixture.repository.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_description_is_fatal() {
        let fixture = Fixture::new().await;
        let definition = fixture
            .define(
                AssetDefinition::new("described")
                    .confirmed()
                    .with_description_schema(json!({"type": "object"})),
            )
            .await;

        let err = fixture
            .service
            .reconcile_confirmation_event(&make_event(definition.id, "0xaa", 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingDescription);
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_invalid_fetched_content_leaves_no_marks() {
        let fixture = Fixture::new().await;
        let definition = fixture
            .define(unique_points().with_description_schema(
                json!({"type": "object", "required": ["title"]}),
            ))
            .await;

        let pending = fixture
            .service
            .create_structured("a", definition.id, Some(json!({"title": "t"})), json!({"x": 1}), false)
            .await
            .unwrap();
        let pending = fixture.service.get_instance(pending).await.unwrap();

        // A rival claim on the same content whose description fails the schema
        let mut event = make_event(definition.id, &pending.content_hash, 9);
        event.description_hash = Some(publish(&fixture, &json!({"name": "n"})).await);
        let err = fixture
            .service
            .reconcile_confirmation_event(&event)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.is_fatal());

        // And one whose description is not JSON at all
        fixture.store.inner.put(b"not json".to_vec()).await.unwrap();
        event.description_hash = Some(sha256_hex(b"not json"));
        assert!(fixture.service.reconcile_confirmation_event(&event).await.is_err());

        assert_eq!(fixture.service.get_instance(pending.id).await.unwrap(), pending);
        assert_eq!(fixture.repository.len().await, 1);
    }

    #[tokio::test]
    async fn test_unfetchable_payload_is_a_transport_failure() {
        let fixture = Fixture::new().await;
        let definition = fixture
            .define(AssetDefinition::new("points").confirmed().with_content_schema(x_schema()))
            .await;

        let err = fixture
            .service
            .reconcile_confirmation_event(&make_event(definition.id, &sha256_hex(b"absent"), 1))
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert!(fixture.repository.is_empty().await);
    }

    #[tokio::test]
    async fn test_private_content_is_never_fetched() {
        let fixture = Fixture::new().await;
        let definition = fixture
            .define(
                AssetDefinition::new("secrets")
                    .confirmed()
                    .with_content_schema(x_schema())
                    .private_content(),
            )
            .await;

        let event = make_event(definition.id, &sha256_hex(b"elsewhere"), 3);
        fixture.service.reconcile_confirmation_event(&event).await.unwrap();

        let instance = fixture.service.get_instance(event.asset_instance_id).await.unwrap();
        assert!(instance.confirmed);
        assert!(instance.content.is_none());
        assert_eq!(fixture.store.gets(), 0);
    }

    #[tokio::test]
    async fn test_confirmed_values_overwrite_optimistic_ones() {
        let mut fixture = Fixture::new().await;
        let definition = fixture
            .define(AssetDefinition::new("points").confirmed().with_content_schema(x_schema()))
            .await;

        let id = fixture
            .service
            .create_structured("a", definition.id, None, json!({"x": 1}), true)
            .await
            .unwrap();
        let mut event = fixture.next_event().await;
        event.content_hash = publish(&fixture, &json!({"x": 2})).await;

        fixture.service.reconcile_confirmation_event(&event).await.unwrap();

        let instance = fixture.service.get_instance(id).await.unwrap();
        assert_eq!(instance.content, Some(json!({"x": 2})));
        assert_eq!(instance.content_hash, event.content_hash);
        assert_eq!(fixture.store.gets(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creations_against_confirmed_holder_all_conflict() {
        let mut fixture = Fixture::new().await;
        let definition = fixture.define(unique_points()).await;

        fixture
            .service
            .create_structured("holder", definition.id, None, json!({"x": 1}), true)
            .await
            .unwrap();
        let event = fixture.next_event().await;
        fixture.service.reconcile_confirmation_event(&event).await.unwrap();
        let submitted = fixture.ledger.submissions().await.len();

        let definition_id = definition.id;
        let attempts: Vec<_> = (0..16)
            .map(|n| {
                let service = fixture.service.clone();
                tokio::spawn(async move {
                    service
                        .create_structured(&format!("0x{:02}", n), definition_id, None, json!({"x": 1}), false)
                        .await
                })
            })
            .collect();

        for attempt in attempts {
            let err = attempt.await.unwrap().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Conflict);
        }
        assert_eq!(fixture.repository.len().await, 1);
        assert_eq!(fixture.ledger.submissions().await.len(), submitted);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rival_confirmations_confirm_exactly_one() {
        let mut fixture = Fixture::new().await;
        let definition = fixture.define(unique_points()).await;

        let first = fixture
            .service
            .create_structured("a", definition.id, None, json!({"x": 1}), true)
            .await
            .unwrap();
        let first_event = fixture.next_event().await;
        let second = fixture
            .service
            .create_structured("b", definition.id, None, json!({"x": 1}), true)
            .await
            .unwrap();
        let second_event = fixture.next_event().await;

        let reconciles: Vec<_> = [first_event, second_event]
            .into_iter()
            .map(|event| {
                let service = fixture.service.clone();
                tokio::spawn(async move { service.reconcile_confirmation_event(&event).await })
            })
            .collect();

        let mut confirmed = 0;
        for reconcile in reconciles {
            match reconcile.await.unwrap() {
                Ok(_) => confirmed += 1,
                Err(err) => assert_eq!(err.kind(), ErrorKind::ContentConflict),
            }
        }
        assert_eq!(confirmed, 1);

        let mut states = vec![
            fixture.service.get_instance(first).await.unwrap().state(),
            fixture.service.get_instance(second).await.unwrap().state(),
        ];
        states.sort_by_key(|state| *state == InstanceState::Conflicted);
        assert_eq!(states, vec![InstanceState::Confirmed, InstanceState::Conflicted]);
    }
}
