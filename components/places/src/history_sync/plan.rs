/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection};
use sql_support::ConnExt;
use url::{Url};

use super::{MAX_OUTGOING_PLACES, MAX_VISITS, HISTORY_TTL};
use super::record::{HistoryRecord, HistoryRecordVisit, HistorySyncRecord};
use types::{SyncGuid, Timestamp, VisitTransition};
use storage::history_sync::{
    apply_synced_deletion,
    apply_synced_visits,
    apply_synced_reconcilliation,
    fetch_outgoing,
    fetch_visits,
    FetchedVisit,
    FetchedVisitPage,
    finish_outgoing,
    OutgoingInfo,
};
use valid_guid::{is_valid_places_guid};

use api::history::{can_add_url};
use error::*;

use sync15_adapter::{
    IncomingChangeset,
    OutgoingChangeset,
    Payload,
};

// In desktop sync, bookmarks are clamped to Jan 23, 1993 (which is 727747200000)
// There's no good reason history records could be older than that, so we do
// the same here (even though desktop's history currently doesn't)
// XXX - there's probably a case to be made for this being, say, 5 years ago -
// then all requests earlier than that are collapsed into a single visit at
// this timestamp.
const EARLIEST_TIMESTAMP: Timestamp = Timestamp(727747200000);

/// Clamps a history visit date between the current date and the earliest
/// sensible date.
fn clamp_visit_date(visit_date: Timestamp) -> Timestamp {
    let now = Timestamp::now();
    if visit_date > now {
        return visit_date;
    }
    if visit_date < EARLIEST_TIMESTAMP {
        return EARLIEST_TIMESTAMP;
    }
    return visit_date;
}

#[derive(Debug)]
pub enum IncomingPlan {
    Skip, // An entry we just want to ignore - either due to the URL etc, or because no changes.
    Invalid(Error), // Something's wrong with this entry.
    Failed(Error), // The entry appears sane, but there was some error.
    Delete, // We should delete this.
    // We should apply this. If SyncGuid is Some, then it is the existing guid
    // for the same URL, and if that doesn't match the incoming record, we
    // should change the existing item to the incoming one and upload a tombstone.
    Apply(Option<SyncGuid>, Url, Option<String>, Vec<HistoryRecordVisit>),
    Reconciled, // Entry exists locally and it's the same as the incoming record.
}


fn plan_incoming_record(conn: &Connection, record: HistoryRecord, max_visits: usize) -> IncomingPlan {
    let url = match Url::parse(&record.hist_uri) {
        Ok(u) => u,
        Err(e) => return IncomingPlan::Invalid(e.into()),
    };

    if !is_valid_places_guid(record.id.as_ref()) {
        return IncomingPlan::Invalid(InvalidPlaceInfo::InvalidGuid.into());
    }

    match can_add_url(&url) {
        Ok(can) => if !can { return IncomingPlan::Skip },
        Err(e) => return IncomingPlan::Failed(e.into()),
    }
    // Let's get what we know about it, if anything - last 20, like desktop?
    let visit_tuple = match fetch_visits(conn, &url, max_visits) {
        Ok(v) => v,
        Err(e) => return IncomingPlan::Failed(e.into()),
    };

    // This all seems more messy than it should be - struggling to find the
    // correct signature for fetch_visits
    let (existing_page, existing_visits): (Option<FetchedVisitPage>, Vec<FetchedVisit>) = match visit_tuple {
        None => (None, Vec::new()),
        Some((p, v)) => (Some(p), v),
    };

    let mut old_guid: Option<SyncGuid> = None;
    let mut cur_visit_map: HashSet<(VisitTransition, Timestamp)> = HashSet::with_capacity(existing_visits.len());
    if let Some(p) = &existing_page {
        if p.guid != record.id {
            old_guid = Some(p.guid.clone());
        }
        for visit in &existing_visits {
            // it should be impossible for us to have invalid visits locally, but...
            let transition = match visit.visit_type {
                Some(t) => t,
                None => continue,
            };
            let date_use = clamp_visit_date(visit.visit_date);
            cur_visit_map.insert((transition, date_use));
        }
    }
    // If we already have MAX_RECORDS visits, then we will ignore incoming
    // visits older than that. (Not really clear why we do this and why 20 is
    // magic, but what's good enough for desktop is good enough for us at this
    // stage.)
    let earliest_allowed: SystemTime = if existing_visits.len() == max_visits as usize {
        existing_visits[existing_visits.len() - 1].visit_date.into()
    } else {
        UNIX_EPOCH
    };

    // work out which of the incoming records we should apply.
    let mut to_apply = Vec::with_capacity(record.visits.len());
    for incoming_visit in record.visits {
        let transition = match VisitTransition::from_primitive(incoming_visit.transition) {
            Some(v) => v,
            None => continue,
        };
        let timestamp = clamp_visit_date(incoming_visit.date);
        if earliest_allowed > timestamp.into() {
            continue;
        }
        // If the entry isn't in our map we should add it.
        let key = (transition, timestamp);
        if !cur_visit_map.contains(&key) {
            to_apply.push(HistoryRecordVisit { date: timestamp, transition: transition as u8 });
            cur_visit_map.insert(key);
        }
    }
    if to_apply.len() != 0 || old_guid.is_some() {
        // Now we need to check the other attributes.
        // Check if we should update title? For now, assume yes. It appears
        // as though desktop always updates it.
        let new_title = Some(record.title);
        IncomingPlan::Apply(old_guid, url.clone(), new_title, to_apply)
    } else {
        IncomingPlan::Reconciled
    }
}

pub fn apply_plan(conn: &Connection, inbound: IncomingChangeset) -> Result<OutgoingChangeset> {
    // for a first-cut, let's do this in the most naive way possible...
    let mut plans: Vec<(SyncGuid, IncomingPlan)> = Vec::with_capacity(inbound.changes.len());
    for incoming in inbound.changes {
        let item = HistorySyncRecord::from_payload(incoming.0)?;
        let plan = match item.record {
            Some(record) => plan_incoming_record(conn, record, MAX_VISITS),
            None => IncomingPlan::Delete,
        };
        let guid = item.guid.clone();
        plans.push((guid, plan));
    }

    let tx = conn.unchecked_transaction()?;
    let mut num_applied = 0;
    let mut num_deleted = 0;
    let mut num_reconciled = 0;

    let mut outgoing = OutgoingChangeset::new("history".into(), inbound.timestamp);
    for (guid, plan) in plans {
        match &plan {
            IncomingPlan::Skip => {
                trace!("incoming: skipping item {:?}", guid);
            },
            IncomingPlan::Invalid(err) => {
                warn!("incoming: record {:?} skipped because it is invalid: {}", guid, err);
            },
            IncomingPlan::Failed(err) => {
                error!("incoming: record {:?} failed to apply: {}", guid, err);
            },
            IncomingPlan::Delete => {
                trace!("incoming: deleting {:?}", guid);
                num_deleted += 1;
                apply_synced_deletion(&conn, &guid)?;
            },
            IncomingPlan::Apply(old_guid, url, title, visits_to_add) => {
                num_applied += 1;
                trace!("incoming: will apply {:?}: url={:?}, title={:?}, to_add={:?}",
                      guid, url, title, visits_to_add);
                apply_synced_visits(&conn, &guid, &old_guid, &url, title, visits_to_add)?;
                if let Some(ref old_guid) = old_guid {
                    outgoing.changes.push(Payload::new_tombstone(old_guid.0.clone()));
                }
            },
            IncomingPlan::Reconciled => {
                num_reconciled += 1;
                trace!("incoming: reconciled {:?}", guid);
                apply_synced_reconcilliation(&conn, &guid)?;
            },
        };
    }
    // XXX - we could probably commit the transaction here and start a new
    // one? OTOH, we might look at killing all transactions here?
    let mut out_infos = fetch_outgoing(conn, MAX_OUTGOING_PLACES, MAX_VISITS)?;

    for (guid, out_record) in out_infos.drain() {
        let payload = match out_record {
            OutgoingInfo::Record(record) => {
                // XXX - comments in `from_record` imply this is dumb. I'm
                // really not sure I'm using `Payload` correctly?
                Payload::from_record(record)?
            },
            // XXX - we need a way to ensure the TTL is set on the tombstone?
            OutgoingInfo::Tombstone => Payload::new_tombstone_with_ttl(guid.0.clone(),
                                                                       HISTORY_TTL),
        };
        trace!("outgoing {:?}", payload);
        outgoing.changes.push(payload);
    }
    tx.commit()?;

    info!("incoming: applied {}, deleted {}, reconciled {}", num_applied, num_deleted, num_reconciled);

    Ok(outgoing)
}

pub fn finish_plan(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    finish_outgoing(conn)?;
    trace!("Committing final sync plan");
    tx.commit()?;
    Ok(())
}
