use anyhow::Context;
use chrono::{DateTime, Utc};
use diesel::{
    ExpressionMethods, PgConnection, QueryDsl, RunQueryDsl, SelectableHelper,
};
use orm::points::{PointDb, PointInsertDb, PointTypeDb};
use orm::schema::points;
use shared::point::{PointKey, PointRecord, PointType};

// Postgres caps bind parameters at 65535, a point row binds 6
const INSERT_CHUNK: usize = 10_000;

/// Inserts `records` chunk by chunk, skipping rows that conflict on
/// `(time, holder, point_type)`. A failing chunk is logged and skipped so
/// the others still land; the returned keys are the rows actually inserted.
pub fn insert_points(
    conn: &mut PgConnection,
    records: &[PointRecord],
) -> anyhow::Result<Vec<PointKey>> {
    let mut inserted = Vec::with_capacity(records.len());

    for chunk in records.chunks(INSERT_CHUNK) {
        let rows = chunk
            .iter()
            .map(PointInsertDb::from_record)
            .collect::<Vec<_>>();

        let result = diesel::insert_into(points::table)
            .values::<Vec<PointInsertDb>>(rows)
            .on_conflict_do_nothing()
            .returning(PointDb::as_returning())
            .get_results::<PointDb>(conn);

        match result {
            Ok(rows) => inserted.extend(rows.iter().map(PointDb::key)),
            Err(e) => tracing::error!(
                reason = %e,
                records = chunk.len(),
                "Failed to insert point chunk"
            ),
        }
    }

    Ok(inserted)
}

pub fn point_exists(
    conn: &mut PgConnection,
    kind: PointType,
    time: DateTime<Utc>,
) -> anyhow::Result<bool> {
    diesel::select(diesel::dsl::exists(
        points::table
            .filter(points::point_type.eq(PointTypeDb::from(kind)))
            .filter(points::time.eq(time)),
    ))
    .get_result::<bool>(conn)
    .context("Failed to query points")
}
