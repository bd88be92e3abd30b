use shared::types::{Lead, LeadStats, LeadStatus, NewLead};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{QueryBuilder, Result, Row, Sqlite};

use super::utils::get_timestamp;

/// Which leads a caller may see.
///
/// `All` is the administrator view; `Client(None)` is a client user without
/// a tenant and sees nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadScope {
    All,
    Client(Option<i64>),
}

/// Optional filters for `list_leads`
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
    pub limit: i64,
    pub offset: i64,
}

fn lead_from_row(row: &SqliteRow) -> Result<Lead> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<LeadStatus>()
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: "status".to_string(),
            source: e.into(),
        })?;

    Ok(Lead {
        id: row.try_get("id")?,
        client_id: row.try_get("client_id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        subject: row.try_get("subject")?,
        status,
        source: row.try_get("source")?,
        created_at: row.try_get("created_at")?,
    })
}

fn push_scope(builder: &mut QueryBuilder<'_, Sqlite>, scope: LeadScope) {
    match scope {
        LeadScope::All => {
            builder.push(" WHERE 1 = 1");
        }
        LeadScope::Client(Some(client_id)) => {
            builder.push(" WHERE client_id = ").push_bind(client_id);
        }
        LeadScope::Client(None) => {
            builder.push(" WHERE 1 = 0");
        }
    }
}

/// List leads visible in `scope`, newest first
pub async fn list_leads(
    pool: &SqlitePool,
    scope: LeadScope,
    filter: &LeadFilter,
) -> Result<Vec<Lead>> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT id, client_id, email, name, subject, status, source, created_at FROM leads",
    );
    push_scope(&mut builder, scope);

    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }

    builder
        .push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset);

    let rows = builder.build().fetch_all(pool).await?;
    rows.iter().map(lead_from_row).collect()
}

/// Fetch a single lead, only if it is visible in `scope`
pub async fn get_lead(pool: &SqlitePool, scope: LeadScope, lead_id: i64) -> Result<Option<Lead>> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT id, client_id, email, name, subject, status, source, created_at FROM leads",
    );
    push_scope(&mut builder, scope);
    builder.push(" AND id = ").push_bind(lead_id);

    let row = builder.build().fetch_optional(pool).await?;
    row.as_ref().map(lead_from_row).transpose()
}

/// Per-status counts of the leads visible in `scope`
pub async fn lead_stats(pool: &SqlitePool, scope: LeadScope) -> Result<LeadStats> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT status, COUNT(*) AS n FROM leads");
    push_scope(&mut builder, scope);
    builder.push(" GROUP BY status");

    let rows = builder.build().fetch_all(pool).await?;

    let mut stats = LeadStats::default();
    for row in rows {
        let status: String = row.try_get("status")?;
        let count: i64 = row.try_get("n")?;
        if let Ok(status) = status.parse::<LeadStatus>() {
            stats.add(status, count);
        }
    }
    Ok(stats)
}

/// Insert a lead and return its id
pub async fn create_lead(pool: &SqlitePool, new_lead: NewLead) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO leads (client_id, email, name, subject, status, source, created_at)
         VALUES (?1, ?2, ?3, ?4, 'new', ?5, ?6)",
    )
    .bind(new_lead.client_id)
    .bind(new_lead.email)
    .bind(new_lead.name)
    .bind(new_lead.subject)
    .bind(new_lead.source)
    .bind(get_timestamp())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::open_database;
    use crate::database::users::create_client;

    fn lead(client_id: Option<i64>, email: &str) -> NewLead {
        NewLead {
            client_id,
            email: email.to_string(),
            name: None,
            subject: None,
            source: "web".to_string(),
        }
    }

    fn page(status: Option<LeadStatus>) -> LeadFilter {
        LeadFilter {
            status,
            limit: 10,
            offset: 0,
        }
    }

    #[tokio::test]
    async fn client_scope_hides_other_tenants() {
        let pool = open_database(":memory:").await.unwrap();
        let acme = create_client(&pool, "Acme").await.unwrap();
        let globex = create_client(&pool, "Globex").await.unwrap();

        let mine = create_lead(&pool, lead(Some(acme), "a@acme.test")).await.unwrap();
        let theirs = create_lead(&pool, lead(Some(globex), "b@globex.test")).await.unwrap();
        create_lead(&pool, lead(None, "c@nowhere.test")).await.unwrap();

        let scope = LeadScope::Client(Some(acme));
        let visible = list_leads(&pool, scope, &page(None)).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, mine);

        assert!(get_lead(&pool, scope, theirs).await.unwrap().is_none());
        assert!(get_lead(&pool, LeadScope::All, theirs).await.unwrap().is_some());

        let orphan = LeadScope::Client(None);
        assert!(list_leads(&pool, orphan, &page(None)).await.unwrap().is_empty());
        assert_eq!(lead_stats(&pool, LeadScope::All).await.unwrap().total, 3);
    }

    #[tokio::test]
    async fn status_filter_and_stats_agree() {
        let pool = open_database(":memory:").await.unwrap();
        let first = create_lead(&pool, lead(None, "one@example.com")).await.unwrap();
        create_lead(&pool, lead(None, "two@example.com")).await.unwrap();

        sqlx::query("UPDATE leads SET status = 'qualified' WHERE id = ?1")
            .bind(first)
            .execute(&pool)
            .await
            .unwrap();

        let qualified = list_leads(&pool, LeadScope::All, &page(Some(LeadStatus::Qualified)))
            .await
            .unwrap();
        assert_eq!(qualified.len(), 1);
        assert_eq!(qualified[0].status, LeadStatus::Qualified);

        let stats = lead_stats(&pool, LeadScope::All).await.unwrap();
        assert_eq!(stats.qualified, 1);
        assert_eq!(stats.new, 1);
        assert_eq!(stats.total, 2);
    }

    #[tokio::test]
    async fn paging_returns_newest_first() {
        let pool = open_database(":memory:").await.unwrap();
        for n in 0..3 {
            create_lead(&pool, lead(None, &format!("l{}@example.com", n)))
                .await
                .unwrap();
        }

        let filter = LeadFilter {
            status: None,
            limit: 2,
            offset: 1,
        };
        let rows = list_leads(&pool, LeadScope::All, &filter).await.unwrap();
        let emails: Vec<&str> = rows.iter().map(|l| l.email.as_str()).collect();
        assert_eq!(emails, ["l1@example.com", "l0@example.com"]);
    }
}
