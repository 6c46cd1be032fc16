// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
use crate::error::Result;
use crate::evaluator::evaluate_enrollment;
use crate::persistence::{Database, StoreId, Writer};
use crate::{AppContext, AvailableRandomizationUnits, EnrolledExperiment, Experiment};

use ::uuid::Uuid;
use serde_derive::*;
use std::collections::{HashMap, HashSet};

const DB_KEY_GLOBAL_USER_PARTICIPATION: &str = "user-opt-in";
const DEFAULT_GLOBAL_USER_PARTICIPATION: bool = true;

// These are types we use internally for managing enrollments.
#[derive(Deserialize, Serialize, Debug, Clone, Hash, Eq, PartialEq)]
pub enum EnrolledReason {
    Qualified, // A normal enrollment as per the experiment's rules.
    OptIn,     // Explicit opt-in.
}

// Every experiment has an ExperimentEnrollment, even when we aren't enrolled.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ExperimentEnrollment {
    pub slug: String,
    pub status: EnrollmentStatus,
}

#[derive(Deserialize, Serialize, Debug, Clone, Hash, Eq, PartialEq)]
pub enum EnrollmentStatus {
    // Enrolled
    Enrolled {
        reason: EnrolledReason,
        branch: String,
    },
    // Not enrolled because our evaluator declined to choose us.
    NotSelected,
    // Not enrolled because either enrollment is paused or the experiment is over.
    NotRunning,
    // Not enrolled because we are not being targeted for this experiment.
    NotTargeted,
    // User explicitly opted out.
    OptedOut,
    // There was some error opting in.
    Error {
        // Ideally this would be an Error, but then we'd need to make Error
        // serde compatible, which isn't trivial nor desirable.
        reason: String,
    },
}

impl EnrollmentStatus {
    // This is used in examples, but not in the main dylib.
    #[allow(dead_code)]
    pub fn is_enrolled(&self) -> bool {
        matches!(self, EnrollmentStatus::Enrolled { .. })
    }
}

/// Return information about all enrolled experiments.
pub fn get_enrollments(db: &Database) -> Result<Vec<EnrolledExperiment>> {
    let enrollments: Vec<ExperimentEnrollment> = db.collect_all(StoreId::Enrollments)?;
    let mut result = Vec::with_capacity(enrollments.len());
    for enrollment in enrollments {
        log::debug!("Have enrollment: {:?}", enrollment);
        if let EnrollmentStatus::Enrolled { ref branch, .. } = enrollment.status {
            if let Some(experiment) =
                db.get::<Experiment>(StoreId::Experiments, &enrollment.slug)?
            {
                result.push(EnrolledExperiment {
                    slug: experiment.slug,
                    user_facing_name: experiment.user_facing_name,
                    user_facing_description: experiment.user_facing_description,
                    branch_slug: branch.to_string(),
                });
            } else {
                log::warn!(
                    "Have enrollment {:?} but no matching experiment!",
                    enrollment
                );
            }
        }
    }
    Ok(result)
}

/// Update all enrollments. Typically used immediately after the list of
/// experiments has been refreshed, so some might mean new enrollments, some
/// might have expired, etc.
pub fn update_enrollments(
    db: &Database,
    mut writer: &mut Writer,
    nimbus_id: &Uuid,
    aru: &AvailableRandomizationUnits,
    app_context: &AppContext,
) -> Result<()> {
    log::info!("updating enrollments...");
    // We might have enrollments for experiments which no longer exist, so we
    // first build a set of all IDs in both groups.
    let mut all_slugs = HashSet::new();
    let experiments = db
        .get_store(StoreId::Experiments)
        .collect_all::<Experiment>(writer)?;
    let mut map_experiments = HashMap::with_capacity(experiments.len());
    for e in experiments {
        all_slugs.insert(e.slug.clone());
        map_experiments.insert(e.slug.clone(), e);
    }
    // and existing enrollments.
    let store = db.get_store(StoreId::Enrollments);
    let enrollments = store.collect_all::<ExperimentEnrollment>(&writer)?;
    let mut map_enrollments = HashMap::with_capacity(enrollments.len());
    for e in enrollments {
        all_slugs.insert(e.slug.clone());
        map_enrollments.insert(e.slug.clone(), e);
    }

    // The user may have opted out from experiments altogether.
    let is_user_participating = get_global_user_participation(db, writer)?;

    // XXX - we want to emit events for many of these things, but we are hoping
    // we can put that off until we have a glean rust sdk available and thus
    // avoid the complexity of passing the info to glean via kotlin/swift/js.
    for slug in all_slugs.iter() {
        match (map_experiments.get(slug), map_enrollments.get(slug)) {
            (Some(_), Some(enr)) => {
                // XXX - should check:
                // * is enrollment was previously paused it may not be now.
                // * is it still active?
                // * the branch still exists, etc?
                if !is_user_participating && enr.status.is_enrolled() {
                    let enr = ExperimentEnrollment {
                        slug: slug.clone(),
                        status: EnrollmentStatus::OptedOut,
                    };
                    log::debug!(
                        "Experiment '{}' already has updated enrollment {:?}",
                        slug,
                        enr
                    );
                    store.put(&mut writer, slug, &enr)?;
                } else if is_user_participating && enr.status == EnrollmentStatus::OptedOut {
                    reset_enrollment(db, writer, slug, nimbus_id, aru, app_context)?;
                } else {
                    log::debug!("Experiment '{}' already has enrollment {:?}", slug, enr)
                }
            }
            (Some(exp), None) => {
                if is_user_participating {
                    let enr = evaluate_enrollment(nimbus_id, aru, app_context, &exp)?;
                    log::debug!(
                        "Experiment '{}' is new - enrollment status is {:?}",
                        slug,
                        enr
                    );
                    store.put(&mut writer, slug, &enr)?;
                }
            }
            (None, Some(enr)) => {
                log::debug!(
                    "Experiment '{}' vanished while we had enrollment status of {:?}",
                    slug,
                    enr
                );
                store.delete(&mut writer, slug)?;
            }
            _ => unreachable!(),
        }
    }
    Ok(())
}

/// Resets an experiment to remove any opt-in or opt-out overrides.
pub fn reset_enrollment(
    db: &Database,
    writer: &mut Writer,
    experiment_slug: &str,
    nimbus_id: &Uuid,
    aru: &AvailableRandomizationUnits,
    app_context: &AppContext,
) -> Result<()> {
    let exp_store = db.get_store(StoreId::Experiments);
    let exp = match exp_store.get::<Experiment>(&writer, experiment_slug)? {
        None => {
            // XXX - do we want specific errors for this kind of thing?
            log::warn!("No such experiment '{}'", experiment_slug);
            return Ok(());
        }
        Some(e) => e,
    };
    let enrollment = evaluate_enrollment(nimbus_id, aru, app_context, &exp)?;
    log::debug!(
        "Experiment '{}' reset enrollment {:?}",
        experiment_slug,
        enrollment
    );
    let enr_store = db.get_store(StoreId::Enrollments);
    enr_store.put(writer, experiment_slug, &enrollment)?;
    Ok(())
}

pub fn opt_in_with_branch(db: &Database, experiment_slug: &str, branch: &str) -> Result<()> {
    // For now we don't bother checking if the experiment or branch exist - if
    // they don't the enrollment will just be removed next time we refresh.
    let enrollment = ExperimentEnrollment {
        slug: experiment_slug.to_string(),
        status: EnrollmentStatus::Enrolled {
            reason: EnrolledReason::OptIn,
            branch: branch.to_string(),
        },
    };
    let mut writer = db.write()?;
    db.get_store(StoreId::Enrollments)
        .put(&mut writer, experiment_slug, &enrollment)?;
    writer.commit()?;
    Ok(())
}

pub fn opt_out(db: &Database, experiment_slug: &str) -> Result<()> {
    // As above - check experiment exists?
    let enrollment = ExperimentEnrollment {
        slug: experiment_slug.to_string(),
        status: EnrollmentStatus::OptedOut,
    };
    let mut writer = db.write()?;
    db.get_store(StoreId::Enrollments)
        .put(&mut writer, experiment_slug, &enrollment)?;
    writer.commit()?;
    Ok(())
}

pub fn get_global_user_participation(db: &Database, writer: &Writer) -> Result<bool> {
    let store = db.get_store(StoreId::Meta);
    let opted_in = store.get(writer, DB_KEY_GLOBAL_USER_PARTICIPATION)?;
    if let Some(opted_in) = opted_in {
        Ok(opted_in)
    } else {
        Ok(DEFAULT_GLOBAL_USER_PARTICIPATION)
    }
}

pub fn set_global_user_participation(
    db: &Database,
    writer: &mut Writer,
    opt_in: bool,
) -> Result<()> {
    let store = db.get_store(StoreId::Meta);
    store.put(writer, DB_KEY_GLOBAL_USER_PARTICIPATION, &opt_in)
}
