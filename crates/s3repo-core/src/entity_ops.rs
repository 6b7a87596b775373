//! Generic entity-layer primitives shared by every table in the repository.
//!
//! Built directly on SeaORM's `ActiveModelTrait`/`EntityTrait` methods
//! (`.insert(db)`, `.update(db)`, `Entity::find()`), generalized into
//! table-agnostic functions so the registry, tag catalog, and lifecycle
//! engine share one implementation of `find_or_create`'s race-safe algorithm
//! instead of repeating it per entity.

use sea_orm::sea_query::OnConflict;
use sea_orm::{
	ActiveModelTrait, Condition, ConnectionTrait, DbErr, EntityTrait, FromQueryResult,
	PrimaryKeyTrait, QueryFilter, QuerySelect, Statement, TryIntoModel,
};
use sea_orm::query::{LockBehavior, LockType};

use crate::error::{CoreError, CoreResult};

/// The outcome of [`find_or_create`]: whether the returned row was just
/// inserted by this call, or already existed (possibly inserted a moment
/// ago by a concurrent caller). Replaces exception-based control flow —
/// callers match on the variant instead of catching a "duplicate key" error.
#[derive(Debug, Clone)]
pub enum Upsert<M> {
	Inserted(M),
	Found(M),
}

impl<M> Upsert<M> {
	pub fn into_inner(self) -> M {
		match self {
			Upsert::Inserted(m) | Upsert::Found(m) => m,
		}
	}

	pub fn get(&self) -> &M {
		match self {
			Upsert::Inserted(m) | Upsert::Found(m) => m,
		}
	}

	pub fn was_inserted(&self) -> bool {
		matches!(self, Upsert::Inserted(_))
	}
}

pub async fn find_by_id<E, C>(
	db: &C,
	id: <E::PrimaryKey as PrimaryKeyTrait>::ValueType,
) -> CoreResult<Option<E::Model>>
where
	E: EntityTrait,
	C: ConnectionTrait,
{
	Ok(E::find_by_id(id).one(db).await?)
}

/// `find_by` with an equality/`IN`-set filter built by the caller via
/// `ColumnTrait::eq`/`::is_in`, composed into a [`Condition`].
pub async fn find_by<E, C>(db: &C, condition: Condition) -> CoreResult<Vec<E::Model>>
where
	E: EntityTrait,
	C: ConnectionTrait,
{
	Ok(E::find().filter(condition).all(db).await?)
}

pub async fn find_one_by<E, C>(db: &C, condition: Condition) -> CoreResult<Option<E::Model>>
where
	E: EntityTrait,
	C: ConnectionTrait,
{
	Ok(E::find().filter(condition).one(db).await?)
}

/// Parameterized raw SQL, for the query engine's compiled tag predicates.
pub async fn find_by_sql<M, C>(db: &C, stmt: Statement) -> CoreResult<Vec<M>>
where
	M: FromQueryResult,
	C: ConnectionTrait,
{
	Ok(M::find_by_statement(stmt).all(db).await?)
}

pub async fn insert<E, C>(db: &C, active_model: E::ActiveModel) -> CoreResult<E::Model>
where
	E: EntityTrait,
	E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
	C: ConnectionTrait,
{
	Ok(active_model.insert(db).await?)
}

/// Upsert against the model's own primary key: updates the row if set,
/// otherwise inserts. Returns the live row, as `ActiveModel::save` does.
pub async fn update<E, C>(db: &C, active_model: E::ActiveModel) -> CoreResult<E::Model>
where
	E: EntityTrait,
	E::ActiveModel: ActiveModelTrait<Entity = E> + TryIntoModel<E::Model> + Send,
	C: ConnectionTrait,
{
	let saved = active_model.save(db).await?;
	let model: E::Model = saved.try_into_model().map_err(CoreError::Database)?;
	Ok(model)
}

pub async fn delete<E, C>(db: &C, active_model: E::ActiveModel) -> CoreResult<u64>
where
	E: EntityTrait,
	E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
	C: ConnectionTrait,
{
	let result = active_model.delete(db).await?;
	Ok(result.rows_affected)
}

/// `SELECT ... FOR UPDATE NOWAIT`. Fails with [`CoreError::LockUnavailable`]
/// when Postgres reports the row is already locked (SQLSTATE `55P03`)
/// instead of bubbling the raw driver error.
pub async fn rowlock<E, C>(
	db: &C,
	id: <E::PrimaryKey as PrimaryKeyTrait>::ValueType,
) -> CoreResult<E::Model>
where
	E: EntityTrait,
	C: ConnectionTrait,
{
	let result = E::find_by_id(id)
		.lock_with_behavior(LockType::Update, LockBehavior::Nowait)
		.one(db)
		.await;

	match result {
		Ok(Some(model)) => Ok(model),
		Ok(None) => Err(CoreError::Database(DbErr::RecordNotFound(
			"rowlock target does not exist".to_owned(),
		))),
		Err(err) if is_lock_not_available(&err) => {
			Err(CoreError::LockUnavailable(err.to_string()))
		}
		Err(err) => Err(err.into()),
	}
}

fn is_lock_not_available(err: &DbErr) -> bool {
	match err {
		DbErr::Query(runtime_err) | DbErr::Exec(runtime_err) => match runtime_err {
			sea_orm::RuntimeErr::SqlxError(sqlx::Error::Database(db_err)) => {
				db_err.code().as_deref() == Some("55P03")
			}
			_ => false,
		},
		_ => false,
	}
}

/// The race-safe upsert primitive every `find_or_create` wrapper builds on:
/// try `find_by_key` first, then `INSERT ... ON CONFLICT (conflict_columns)
/// DO NOTHING RETURNING *`, then re-`find_by_key` if the insert lost the
/// race. The winning row is always returned, never the caller's candidate.
pub async fn find_or_create<E, C>(
	db: &C,
	key_condition: Condition,
	conflict_columns: Vec<E::Column>,
	active_model: E::ActiveModel,
) -> CoreResult<Upsert<E::Model>>
where
	E: EntityTrait,
	E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
	C: ConnectionTrait,
{
	if let Some(existing) = find_one_by::<E, _>(db, key_condition.clone()).await? {
		return Ok(Upsert::Found(existing));
	}

	let insert_result = E::insert(active_model)
		.on_conflict(OnConflict::columns(conflict_columns).do_nothing().to_owned())
		.exec_with_returning(db)
		.await;

	match insert_result {
		Ok(model) => Ok(Upsert::Inserted(model)),
		Err(DbErr::RecordNotInserted) => {
			let winner = find_one_by::<E, _>(db, key_condition).await?.ok_or_else(|| {
				CoreError::Database(DbErr::RecordNotFound(
					"find_or_create lost the insert race but found no row on re-query".to_owned(),
				))
			})?;
			Ok(Upsert::Found(winner))
		}
		Err(err) => Err(err.into()),
	}
}
