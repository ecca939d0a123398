use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{QueryBuilder, Row};
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};
use uuid::Uuid;

use crate::models::booking::{Booking, BookingFilter, BookingPatch, BookingStatus, NewBooking};
use crate::models::checkin::{
    CheckIn, CheckInFilter, CheckInStatus, NewCheckIn, PresenceHolder,
};
use crate::models::space::{Space, SpaceKind};
use crate::models::user::{ProfileUpdate, Subject};
use crate::store::{BookingStore, CheckInStore, SpaceCatalog, SubjectDirectory};
use crate::utils::errorhandler::{AppError, AppResult};

/// Postgres store. Admission decisions run inside SERIALIZABLE transactions;
/// the schema's exclusion and partial-unique constraints back them up.
pub struct PgStore {
    pool: PgPool,
}

const SCHEMA: &str = r#"
CREATE EXTENSION IF NOT EXISTS btree_gist;

DO $$ BEGIN
    CREATE TYPE space_kind AS ENUM ('desk', 'office', 'meeting_room');
EXCEPTION WHEN duplicate_object THEN NULL;
END $$;

DO $$ BEGIN
    CREATE TYPE booking_status AS ENUM ('pending', 'confirmed', 'cancelled', 'completed');
EXCEPTION WHEN duplicate_object THEN NULL;
END $$;

DO $$ BEGIN
    CREATE TYPE checkin_status AS ENUM ('pending', 'checked_in', 'checked_out');
EXCEPTION WHEN duplicate_object THEN NULL;
END $$;

CREATE TABLE IF NOT EXISTS users (
    user_id UUID PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    phone TEXT,
    building_id UUID,
    laptop_model TEXT,
    laptop_asset_number TEXT,
    photo_url TEXT,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS spaces (
    space_id UUID PRIMARY KEY,
    building_id UUID NOT NULL,
    name TEXT NOT NULL,
    kind space_kind NOT NULL,
    capacity INTEGER NOT NULL DEFAULT 1,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (building_id, kind)
);

CREATE TABLE IF NOT EXISTS bookings (
    booking_id UUID PRIMARY KEY,
    subject_id UUID NOT NULL,
    space_id UUID NOT NULL REFERENCES spaces (space_id),
    booking_date DATE NOT NULL,
    start_time TIME NOT NULL,
    end_time TIME NOT NULL,
    status booking_status NOT NULL DEFAULT 'pending',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CHECK (start_time < end_time),
    CONSTRAINT bookings_no_active_overlap EXCLUDE USING gist (
        space_id WITH =,
        tsrange(booking_date + start_time, booking_date + end_time) WITH &&
    ) WHERE (status IN ('pending', 'confirmed'))
);

CREATE TABLE IF NOT EXISTS checkins (
    checkin_id UUID PRIMARY KEY,
    user_id UUID,
    visitor_id UUID,
    building_id UUID,
    floor TEXT NOT NULL,
    block TEXT NOT NULL,
    laptop_model TEXT,
    laptop_asset_number TEXT,
    check_in_time TIMESTAMP NOT NULL,
    check_out_time TIMESTAMP,
    expires_at TIMESTAMP,
    officer_id UUID,
    status checkin_status NOT NULL DEFAULT 'pending',
    qr_payload TEXT NOT NULL,
    CHECK ((user_id IS NULL) <> (visitor_id IS NULL))
);

CREATE UNIQUE INDEX IF NOT EXISTS checkins_one_active_per_user
    ON checkins (user_id) WHERE status <> 'checked_out' AND user_id IS NOT NULL;

CREATE UNIQUE INDEX IF NOT EXISTS checkins_one_active_per_visitor
    ON checkins (visitor_id) WHERE status <> 'checked_out' AND visitor_id IS NOT NULL;

CREATE TABLE IF NOT EXISTS booking_checkins (
    booking_id UUID NOT NULL REFERENCES bookings (booking_id),
    checkin_id UUID NOT NULL REFERENCES checkins (checkin_id),
    PRIMARY KEY (booking_id, checkin_id)
);
"#;

impl PgStore {
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(15)
            .connect(database_url)
            .await?;
        let store = PgStore { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> AppResult<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn set_serializable(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>) -> AppResult<()> {
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

// checkins keeps naive timestamps; they are UTC by convention and the
// conversion below is the single place that assumption lives.
fn naive_utc(t: OffsetDateTime) -> PrimitiveDateTime {
    let utc = t.to_offset(UtcOffset::UTC);
    PrimitiveDateTime::new(utc.date(), utc.time())
}

#[derive(sqlx::FromRow)]
struct CheckInRow {
    checkin_id: Uuid,
    user_id: Option<Uuid>,
    visitor_id: Option<Uuid>,
    building_id: Option<Uuid>,
    floor: String,
    block: String,
    laptop_model: Option<String>,
    laptop_asset_number: Option<String>,
    check_in_time: PrimitiveDateTime,
    check_out_time: Option<PrimitiveDateTime>,
    expires_at: Option<PrimitiveDateTime>,
    officer_id: Option<Uuid>,
    status: CheckInStatus,
    qr_payload: String,
}

impl TryFrom<CheckInRow> for CheckIn {
    type Error = AppError;

    fn try_from(row: CheckInRow) -> Result<Self, AppError> {
        let holder = match (row.user_id, row.visitor_id) {
            (Some(id), None) => PresenceHolder::Subject(id),
            (None, Some(id)) => PresenceHolder::Visitor(id),
            _ => {
                return Err(AppError::database(
                    "checkin row must reference exactly one of user or visitor",
                ));
            }
        };
        Ok(CheckIn {
            checkin_id: row.checkin_id,
            holder,
            building_id: row.building_id,
            floor: row.floor,
            block: row.block,
            laptop_model: row.laptop_model,
            laptop_asset_number: row.laptop_asset_number,
            check_in_time: row.check_in_time.assume_utc(),
            check_out_time: row.check_out_time.map(PrimitiveDateTime::assume_utc),
            expires_at: row.expires_at.map(PrimitiveDateTime::assume_utc),
            officer_id: row.officer_id,
            status: row.status,
            qr_payload: row.qr_payload,
        })
    }
}

#[async_trait]
impl SpaceCatalog for PgStore {
    async fn find_by_building_and_kind(
        &self,
        building_id: Uuid,
        kind: SpaceKind,
    ) -> AppResult<Option<Space>> {
        let space = sqlx::query_as::<_, Space>(
            "SELECT space_id, building_id, name, kind, capacity, created_at
             FROM spaces WHERE building_id = $1 AND kind = $2",
        )
        .bind(building_id)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;
        Ok(space)
    }
}

#[async_trait]
impl SubjectDirectory for PgStore {
    async fn find_subject(&self, user_id: Uuid) -> AppResult<Option<Subject>> {
        let subject = sqlx::query_as::<_, Subject>(
            "SELECT user_id, email, first_name, last_name, phone, building_id,
                    laptop_model, laptop_asset_number, photo_url, is_active, created_at
             FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(subject)
    }

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> AppResult<Subject> {
        sqlx::query_as::<_, Subject>(
            "UPDATE users SET
                 first_name = COALESCE($2, first_name),
                 last_name = COALESCE($3, last_name),
                 phone = COALESCE($4, phone),
                 laptop_model = COALESCE($5, laptop_model),
                 laptop_asset_number = COALESCE($6, laptop_asset_number),
                 photo_url = COALESCE($7, photo_url)
             WHERE user_id = $1
             RETURNING user_id, email, first_name, last_name, phone, building_id,
                       laptop_model, laptop_asset_number, photo_url, is_active, created_at",
        )
        .bind(user_id)
        .bind(update.first_name)
        .bind(update.last_name)
        .bind(update.phone)
        .bind(update.laptop_model)
        .bind(update.laptop_asset_number)
        .bind(update.photo_url)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn admit(&self, new: NewBooking) -> AppResult<Booking> {
        let mut tx = self.pool.begin().await?;
        Self::set_serializable(&mut tx).await?;

        let overlap = sqlx::query(
            "SELECT booking_id FROM bookings
             WHERE space_id = $1 AND booking_date = $2
               AND status IN ('pending', 'confirmed')
               AND start_time < $3 AND end_time > $4
             LIMIT 1",
        )
        .bind(new.space_id)
        .bind(new.booking_date)
        .bind(new.slot.end)
        .bind(new.slot.start)
        .fetch_optional(&mut *tx)
        .await?;
        if overlap.is_some() {
            return Err(AppError::conflict(
                "Space is already booked for the selected time",
            ));
        }

        let booking = Booking {
            booking_id: Uuid::new_v4(),
            subject_id: new.subject_id,
            space_id: new.space_id,
            booking_date: new.booking_date,
            start_time: new.slot.start,
            end_time: new.slot.end,
            status: BookingStatus::Pending,
            created_at: new.created_at,
        };
        sqlx::query(
            "INSERT INTO bookings
                 (booking_id, subject_id, space_id, booking_date, start_time, end_time, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(booking.booking_id)
        .bind(booking.subject_id)
        .bind(booking.space_id)
        .bind(booking.booking_date)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(booking.status)
        .bind(booking.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(booking)
    }

    async fn find(&self, booking_id: Uuid) -> AppResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(
            "SELECT booking_id, subject_id, space_id, booking_date, start_time, end_time, status, created_at
             FROM bookings WHERE booking_id = $1",
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(booking)
    }

    async fn update(&self, booking_id: Uuid, patch: BookingPatch) -> AppResult<Booking> {
        let mut tx = self.pool.begin().await?;
        Self::set_serializable(&mut tx).await?;

        let existing = sqlx::query_as::<_, Booking>(
            "SELECT booking_id, subject_id, space_id, booking_date, start_time, end_time, status, created_at
             FROM bookings WHERE booking_id = $1",
        )
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Booking not found"))?;

        let overlap = sqlx::query(
            "SELECT booking_id FROM bookings
             WHERE space_id = $1 AND booking_date = $2
               AND booking_id <> $3
               AND status IN ('pending', 'confirmed')
               AND start_time < $4 AND end_time > $5
             LIMIT 1",
        )
        .bind(patch.space_id)
        .bind(patch.booking_date)
        .bind(booking_id)
        .bind(patch.slot.end)
        .bind(patch.slot.start)
        .fetch_optional(&mut *tx)
        .await?;
        if overlap.is_some() {
            return Err(AppError::conflict(
                "Space is already booked for the selected time",
            ));
        }

        sqlx::query(
            "UPDATE bookings
             SET subject_id = $2, space_id = $3, booking_date = $4, start_time = $5, end_time = $6
             WHERE booking_id = $1",
        )
        .bind(booking_id)
        .bind(patch.subject_id)
        .bind(patch.space_id)
        .bind(patch.booking_date)
        .bind(patch.slot.start)
        .bind(patch.slot.end)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Booking {
            subject_id: patch.subject_id,
            space_id: patch.space_id,
            booking_date: patch.booking_date,
            start_time: patch.slot.start,
            end_time: patch.slot.end,
            ..existing
        })
    }

    async fn delete(&self, booking_id: Uuid) -> AppResult<()> {
        let res = sqlx::query("DELETE FROM bookings WHERE booking_id = $1")
            .bind(booking_id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() < 1 {
            return Err(AppError::not_found("Booking not found"));
        }
        Ok(())
    }

    async fn active_on(&self, space_id: Uuid, date: Date) -> AppResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, Booking>(
            "SELECT booking_id, subject_id, space_id, booking_date, start_time, end_time, status, created_at
             FROM bookings
             WHERE space_id = $1 AND booking_date = $2 AND status IN ('pending', 'confirmed')",
        )
        .bind(space_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list(&self, filter: BookingFilter) -> AppResult<Vec<Booking>> {
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT b.booking_id, b.subject_id, b.space_id, b.booking_date,
                    b.start_time, b.end_time, b.status, b.created_at
             FROM bookings AS b
             INNER JOIN spaces AS s ON b.space_id = s.space_id
             WHERE 1=1",
        );
        if let Some(subject_id) = filter.subject_id {
            qb.push(" AND b.subject_id = ");
            qb.push_bind(subject_id);
        }
        if let Some(building_id) = filter.building_id {
            qb.push(" AND s.building_id = ");
            qb.push_bind(building_id);
        }
        if let Some(kind) = filter.kind {
            qb.push(" AND s.kind = ");
            qb.push_bind(kind);
        }
        if let Some(booking_date) = filter.booking_date {
            qb.push(" AND b.booking_date = ");
            qb.push_bind(booking_date);
        }
        if let Some(status) = filter.status {
            qb.push(" AND b.status = ");
            qb.push_bind(status);
        }
        qb.push(" ORDER BY b.booking_date, b.start_time");

        let rows = qb
            .build_query_as::<Booking>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[async_trait]
impl CheckInStore for PgStore {
    async fn create(&self, new: NewCheckIn, booking_id: Option<Uuid>) -> AppResult<CheckIn> {
        let mut tx = self.pool.begin().await?;
        Self::set_serializable(&mut tx).await?;

        let user_id = new.holder.subject_id();
        let visitor_id = new.holder.visitor_id();

        // a checked-in holder gets the specific message; the general
        // active-presence rule below would reject them anyway
        let last = sqlx::query(
            "SELECT status FROM checkins
             WHERE user_id IS NOT DISTINCT FROM $1
               AND visitor_id IS NOT DISTINCT FROM $2
             ORDER BY check_in_time DESC
             LIMIT 1",
        )
        .bind(user_id)
        .bind(visitor_id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(row) = last {
            let status: CheckInStatus = row.try_get("status")?;
            if status == CheckInStatus::CheckedIn {
                return Err(AppError::conflict(
                    "User is currently checked in and cannot check in again",
                ));
            }
        }

        let active = sqlx::query(
            "SELECT checkin_id FROM checkins
             WHERE user_id IS NOT DISTINCT FROM $1
               AND visitor_id IS NOT DISTINCT FROM $2
               AND status <> 'checked_out'
             LIMIT 1",
        )
        .bind(user_id)
        .bind(visitor_id)
        .fetch_optional(&mut *tx)
        .await?;
        if active.is_some() {
            return Err(AppError::conflict("User already has an active check-in"));
        }

        if let Some(booking_id) = booking_id {
            let booking = sqlx::query("SELECT booking_id FROM bookings WHERE booking_id = $1")
                .bind(booking_id)
                .fetch_optional(&mut *tx)
                .await?;
            if booking.is_none() {
                return Err(AppError::not_found("Booking not found"));
            }
        }

        sqlx::query(
            "INSERT INTO checkins
                 (checkin_id, user_id, visitor_id, building_id, floor, block,
                  laptop_model, laptop_asset_number, check_in_time, expires_at, status, qr_payload)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(new.checkin_id)
        .bind(user_id)
        .bind(visitor_id)
        .bind(new.building_id)
        .bind(&new.floor)
        .bind(&new.block)
        .bind(&new.laptop_model)
        .bind(&new.laptop_asset_number)
        .bind(naive_utc(new.check_in_time))
        .bind(new.expires_at.map(naive_utc))
        .bind(CheckInStatus::Pending)
        .bind(&new.qr_payload)
        .execute(&mut *tx)
        .await?;

        // same transaction as the check-in insert, so a failed link never
        // leaves an orphaned record
        if let Some(booking_id) = booking_id {
            sqlx::query("INSERT INTO booking_checkins (booking_id, checkin_id) VALUES ($1, $2)")
                .bind(booking_id)
                .bind(new.checkin_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(CheckIn {
            checkin_id: new.checkin_id,
            holder: new.holder,
            building_id: new.building_id,
            floor: new.floor,
            block: new.block,
            laptop_model: new.laptop_model,
            laptop_asset_number: new.laptop_asset_number,
            check_in_time: new.check_in_time,
            check_out_time: None,
            expires_at: new.expires_at,
            officer_id: None,
            status: CheckInStatus::Pending,
            qr_payload: new.qr_payload,
        })
    }

    async fn verify(
        &self,
        checkin_id: Uuid,
        officer_id: Uuid,
        now: OffsetDateTime,
    ) -> AppResult<CheckIn> {
        let mut tx = self.pool.begin().await?;
        Self::set_serializable(&mut tx).await?;

        let row = sqlx::query_as::<_, CheckInRow>("SELECT * FROM checkins WHERE checkin_id = $1")
            .bind(checkin_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Check-in record not found"))?;
        let mut checkin: CheckIn = row.try_into()?;

        if let Some(expires_at) = checkin.expires_at {
            if expires_at < now {
                return Err(AppError::token_expired("QR code has expired"));
            }
        }
        if !checkin.status.accepts_verification() {
            return Err(AppError::invalid_state(
                "Check-in is not pending or already processed",
            ));
        }

        sqlx::query("UPDATE checkins SET status = $2, officer_id = $3 WHERE checkin_id = $1")
            .bind(checkin_id)
            .bind(CheckInStatus::CheckedIn)
            .bind(officer_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        checkin.status = CheckInStatus::CheckedIn;
        checkin.officer_id = Some(officer_id);
        Ok(checkin)
    }

    async fn checkout(
        &self,
        checkin_id: Uuid,
        officer_id: Uuid,
        now: OffsetDateTime,
    ) -> AppResult<CheckIn> {
        let mut tx = self.pool.begin().await?;
        Self::set_serializable(&mut tx).await?;

        let row = sqlx::query_as::<_, CheckInRow>("SELECT * FROM checkins WHERE checkin_id = $1")
            .bind(checkin_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Check-in record not found"))?;
        let mut checkin: CheckIn = row.try_into()?;

        if checkin.status != CheckInStatus::CheckedIn {
            return Err(AppError::invalid_state("User is not currently checked in"));
        }

        sqlx::query(
            "UPDATE checkins SET status = $2, check_out_time = $3, officer_id = $4
             WHERE checkin_id = $1",
        )
        .bind(checkin_id)
        .bind(CheckInStatus::CheckedOut)
        .bind(naive_utc(now))
        .bind(officer_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        checkin.status = CheckInStatus::CheckedOut;
        checkin.check_out_time = Some(now);
        checkin.officer_id = Some(officer_id);
        Ok(checkin)
    }

    async fn find(&self, checkin_id: Uuid) -> AppResult<Option<CheckIn>> {
        let row = sqlx::query_as::<_, CheckInRow>("SELECT * FROM checkins WHERE checkin_id = $1")
            .bind(checkin_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(CheckIn::try_from).transpose()
    }

    async fn list(&self, filter: CheckInFilter) -> AppResult<Vec<CheckIn>> {
        let mut qb: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT * FROM checkins WHERE 1=1");
        if let Some(user_id) = filter.user_id {
            qb.push(" AND user_id = ");
            qb.push_bind(user_id);
        }
        if let Some(visitor_id) = filter.visitor_id {
            qb.push(" AND visitor_id = ");
            qb.push_bind(visitor_id);
        }
        if let Some(building_id) = filter.building_id {
            qb.push(" AND building_id = ");
            qb.push_bind(building_id);
        }
        if let Some(floor) = filter.floor {
            qb.push(" AND floor = ");
            qb.push_bind(floor);
        }
        if let Some(block) = filter.block {
            qb.push(" AND block = ");
            qb.push_bind(block);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ");
            qb.push_bind(status);
        }
        if let Some(start_date) = filter.start_date {
            qb.push(" AND check_in_time >= ");
            qb.push_bind(naive_utc(start_date));
        }
        if let Some(end_date) = filter.end_date {
            qb.push(" AND check_in_time <= ");
            qb.push_bind(naive_utc(end_date));
        }
        qb.push(" ORDER BY check_in_time");

        let rows = qb
            .build_query_as::<CheckInRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(CheckIn::try_from).collect()
    }

    async fn find_for_holder(&self, holder: PresenceHolder) -> AppResult<Vec<CheckIn>> {
        let rows = sqlx::query_as::<_, CheckInRow>(
            "SELECT * FROM checkins
             WHERE user_id IS NOT DISTINCT FROM $1
               AND visitor_id IS NOT DISTINCT FROM $2
             ORDER BY check_in_time",
        )
        .bind(holder.subject_id())
        .bind(holder.visitor_id())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(CheckIn::try_from).collect()
    }
}
