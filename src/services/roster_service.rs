//! Club members, the attendance list of each day, and the queue candidates
//! derived from them.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, info};

use super::require_segment;
use crate::{
    dao::{
        document::{Direction, Document, Fields, Query, SetOptions, encode},
        models::{AttendeeEntity, Identified, MemberEntity, Player},
    },
    error::ServiceError,
    state::DayContext,
};

const NAME: &str = "name";
const LEVEL: &str = "level";
const ARRIVED: &str = "arrived";
const TODAY_CHECKED_IN: &str = "todayCheckedIn";

/// Fields of a member a client may change; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberChanges {
    pub name: Option<String>,
    pub level: Option<u32>,
    pub today_checked_in: Option<bool>,
}

impl MemberChanges {
    fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        if let Some(name) = self.name {
            fields.insert(NAME.to_owned(), Value::from(name));
        }
        if let Some(level) = self.level {
            fields.insert(LEVEL.to_owned(), Value::from(level));
        }
        if let Some(checked_in) = self.today_checked_in {
            fields.insert(TODAY_CHECKED_IN.to_owned(), Value::from(checked_in));
        }
        fields
    }
}

/// Players who can join the day's queue, ordered by name.
///
/// The day's attendee list wins; when it is empty, members checked in
/// today are offered instead.
pub async fn candidates(ctx: &DayContext) -> Result<Vec<Player>, ServiceError> {
    let attendees = ctx
        .store()
        .query(Query::new(ctx.paths().attendees()).order_by(NAME, Direction::Ascending))
        .await?;
    if !attendees.is_empty() {
        return attendees.iter().map(attendee_player).collect();
    }

    debug!(date = ctx.date_key(), "no attendees; falling back to checked-in members");
    let members = ctx
        .store()
        .query(
            Query::new(ctx.paths().members())
                .filter_eq(TODAY_CHECKED_IN, true)
                .order_by(NAME, Direction::Ascending),
        )
        .await?;
    members.iter().map(member_player).collect()
}

/// Every member of the club, ordered by name.
pub async fn list_members(
    ctx: &DayContext,
) -> Result<Vec<Identified<MemberEntity>>, ServiceError> {
    let documents = ctx
        .store()
        .query(Query::new(ctx.paths().members()).order_by(NAME, Direction::Ascending))
        .await?;
    Ok(Identified::decode_all(&documents)?)
}

/// Register a member under a generated id. Members start checked out.
pub async fn create_member(
    ctx: &DayContext,
    name: &str,
    level: u32,
) -> Result<Identified<MemberEntity>, ServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput("member name is required".into()));
    }

    let member = MemberEntity {
        name: name.to_owned(),
        level,
        today_checked_in: false,
    };
    let collection = ctx.paths().members();
    let fields = encode(&collection, &member)?;
    let id = ctx.store().add(collection, fields).await?;
    info!(member_id = %id, group = ?ctx.group_id(), "member created");
    Ok(Identified::new(id, member))
}

/// Apply `changes` to an existing member; returns `false` when the member is unknown.
pub async fn update_member(
    ctx: &DayContext,
    member_id: &str,
    changes: MemberChanges,
) -> Result<bool, ServiceError> {
    require_segment(member_id, "member id")?;
    if matches!(&changes.name, Some(name) if name.trim().is_empty()) {
        return Err(ServiceError::InvalidInput("member name cannot be blank".into()));
    }
    let fields = changes.into_fields();
    if fields.is_empty() {
        return Err(ServiceError::InvalidInput("no member field to update".into()));
    }

    let updated = ctx
        .store()
        .update(ctx.paths().members().doc(member_id), fields)
        .await?;
    if updated {
        info!(member_id, "member updated");
    }
    Ok(updated)
}

/// Remove a member; returns whether one existed.
pub async fn delete_member(ctx: &DayContext, member_id: &str) -> Result<bool, ServiceError> {
    require_segment(member_id, "member id")?;
    let removed = ctx
        .store()
        .delete(ctx.paths().members().doc(member_id))
        .await?;
    if removed {
        info!(member_id, "member deleted");
    }
    Ok(removed)
}

/// The day's attendance list, ordered by name.
pub async fn list_attendees(
    ctx: &DayContext,
) -> Result<Vec<Identified<AttendeeEntity>>, ServiceError> {
    let documents = ctx
        .store()
        .query(Query::new(ctx.paths().attendees()).order_by(NAME, Direction::Ascending))
        .await?;
    Ok(Identified::decode_all(&documents)?)
}

/// Put a player on the day's list; returns `false` when already listed.
pub async fn add_attendee(ctx: &DayContext, player: Player) -> Result<bool, ServiceError> {
    let player = player.normalized();
    require_segment(&player.id, "player id")?;
    let attendee = AttendeeEntity {
        name: player.name,
        level: player.level,
        arrived: false,
    };
    let path = ctx.paths().attendees().doc(player.id.as_str());
    let fields = encode(&path, &attendee)?;
    let added = ctx.store().create(path, fields).await?;
    debug!(date = ctx.date_key(), player_id = %player.id, added, "attendee added");
    Ok(added)
}

/// Take a player off the day's list; returns whether they were listed.
pub async fn remove_attendee(ctx: &DayContext, player_id: &str) -> Result<bool, ServiceError> {
    require_segment(player_id, "player id")?;
    Ok(ctx
        .store()
        .delete(ctx.paths().attendees().doc(player_id))
        .await?)
}

/// Replace the day's list with `players`.
///
/// Players missing from `players` are removed. Listed players get their
/// name and level refreshed and keep their arrival mark.
pub async fn set_attendees(
    ctx: &DayContext,
    players: Vec<Player>,
) -> Result<Vec<Identified<AttendeeEntity>>, ServiceError> {
    let players: Vec<Player> = players.into_iter().map(Player::normalized).collect();
    for player in &players {
        require_segment(&player.id, "player id")?;
    }
    let keep: HashSet<&str> = players.iter().map(|player| player.id.as_str()).collect();

    let collection = ctx.paths().attendees();
    let existing = ctx.store().query(Query::new(collection.clone())).await?;
    for document in existing.iter().filter(|document| !keep.contains(document.id())) {
        ctx.store().delete(collection.doc(document.id())).await?;
    }

    for player in &players {
        let mut fields = Fields::new();
        fields.insert(NAME.to_owned(), Value::from(player.name.as_str()));
        fields.insert(LEVEL.to_owned(), Value::from(player.level));
        ctx.store()
            .set(collection.doc(player.id.as_str()), fields, SetOptions::merge())
            .await?;
    }

    info!(date = ctx.date_key(), attendees = players.len(), "attendance list replaced");
    list_attendees(ctx).await
}

/// Mark a listed player as arrived or not; returns `false` when they are not listed.
pub async fn set_arrived(
    ctx: &DayContext,
    player_id: &str,
    arrived: bool,
) -> Result<bool, ServiceError> {
    require_segment(player_id, "player id")?;
    let mut fields = Fields::new();
    fields.insert(ARRIVED.to_owned(), Value::from(arrived));
    Ok(ctx
        .store()
        .update(ctx.paths().attendees().doc(player_id), fields)
        .await?)
}

fn attendee_player(document: &Document) -> Result<Player, ServiceError> {
    let attendee: AttendeeEntity = document.decode()?;
    Ok(Player::new(document.id(), attendee.name, attendee.level).normalized())
}

fn member_player(document: &Document) -> Result<Player, ServiceError> {
    let member: MemberEntity = document.decode()?;
    Ok(Player::new(document.id(), member.name, member.level).normalized())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::dao::{
        clock::ManualClock,
        document::{Fields, SetOptions},
        document_store::memory::MemoryDocumentStore,
    };

    fn context() -> DayContext {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(MemoryDocumentStore::new(clock.clone()));
        DayContext::new(store, clock, None, "2024-01-01")
    }

    fn fields(value: serde_json::Value) -> Fields {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn attendees_are_listed_by_name() {
        let ctx = context();
        for (id, name) in [("p2", "Zoe"), ("p1", "Ana")] {
            ctx.store()
                .set(
                    ctx.paths().attendees().doc(id),
                    fields(json!({"name": name, "level": 3})),
                    SetOptions::replace(),
                )
                .await
                .unwrap();
        }
        ctx.store()
            .set(
                ctx.paths().members().doc("m1"),
                fields(json!({"name": "Member", "todayCheckedIn": true})),
                SetOptions::replace(),
            )
            .await
            .unwrap();

        let names: Vec<_> = candidates(&ctx)
            .await
            .unwrap()
            .into_iter()
            .map(|player| player.name)
            .collect();
        assert_eq!(names, ["Ana", "Zoe"]);
    }

    #[tokio::test]
    async fn falls_back_to_checked_in_members() {
        let ctx = context();
        for (id, name, checked_in) in [("m1", "Bo", true), ("m2", "Al", false), ("m3", "", true)] {
            ctx.store()
                .set(
                    ctx.paths().members().doc(id),
                    fields(json!({"name": name, "level": 1, "todayCheckedIn": checked_in})),
                    SetOptions::replace(),
                )
                .await
                .unwrap();
        }

        let players = candidates(&ctx).await.unwrap();
        let ids: Vec<_> = players.iter().map(|player| player.id.as_str()).collect();
        assert_eq!(ids, ["m3", "m1"]);
        assert_eq!(players[0].name, "Unknown");
    }

    #[tokio::test]
    async fn checked_in_members_become_candidates() {
        let ctx = context();
        let bo = create_member(&ctx, "Bo", 2).await.unwrap();
        create_member(&ctx, "Al", 1).await.unwrap();
        assert!(!bo.entity.today_checked_in);
        assert!(candidates(&ctx).await.unwrap().is_empty());

        let checked_in = MemberChanges {
            today_checked_in: Some(true),
            ..MemberChanges::default()
        };
        assert!(update_member(&ctx, &bo.id, checked_in).await.unwrap());

        let players = candidates(&ctx).await.unwrap();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].id, bo.id);
        assert_eq!(players[0].level, 2);
    }

    #[tokio::test]
    async fn member_edits_require_an_existing_member() {
        let ctx = context();
        let renamed = MemberChanges {
            name: Some("Cy".into()),
            ..MemberChanges::default()
        };
        assert!(!update_member(&ctx, "ghost", renamed.clone()).await.unwrap());
        assert!(list_members(&ctx).await.unwrap().is_empty());

        let member = create_member(&ctx, "Bo", 3).await.unwrap();
        assert!(update_member(&ctx, &member.id, renamed).await.unwrap());
        let members = list_members(&ctx).await.unwrap();
        assert_eq!(members[0].entity.name, "Cy");
        assert_eq!(members[0].entity.level, 3);

        assert!(delete_member(&ctx, &member.id).await.unwrap());
        assert!(!delete_member(&ctx, &member.id).await.unwrap());
    }

    #[tokio::test]
    async fn member_input_is_checked() {
        let ctx = context();
        assert!(matches!(
            create_member(&ctx, "  ", 1).await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            update_member(&ctx, "m1", MemberChanges::default()).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn attendees_can_be_added_marked_and_removed() {
        let ctx = context();
        assert!(add_attendee(&ctx, Player::new("p1", "Ana", 2)).await.unwrap());
        assert!(!add_attendee(&ctx, Player::new("p1", "Other", 5)).await.unwrap());

        assert!(set_arrived(&ctx, "p1", true).await.unwrap());
        assert!(!set_arrived(&ctx, "p2", true).await.unwrap());

        let listed = list_attendees(&ctx).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].entity.name, "Ana");
        assert!(listed[0].entity.arrived);

        assert!(remove_attendee(&ctx, "p1").await.unwrap());
        assert!(list_attendees(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replacing_the_list_keeps_arrival_marks() {
        let ctx = context();
        add_attendee(&ctx, Player::new("p1", "Ana", 2)).await.unwrap();
        add_attendee(&ctx, Player::new("p2", "Ben", 2)).await.unwrap();
        set_arrived(&ctx, "p1", true).await.unwrap();

        let listed = set_attendees(
            &ctx,
            vec![Player::new("p1", "Ana B", 3), Player::new("p3", "Cleo", 1)],
        )
        .await
        .unwrap();

        let ids: Vec<_> = listed.iter().map(|attendee| attendee.id.as_str()).collect();
        assert_eq!(ids, ["p1", "p3"]);
        assert_eq!(listed[0].entity.name, "Ana B");
        assert_eq!(listed[0].entity.level, 3);
        assert!(listed[0].entity.arrived);
        assert!(!listed[1].entity.arrived);
    }
}
