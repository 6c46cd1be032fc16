/* This Source Code Form is subject to the terms of the Mozilla Public
* License, v. 2.0. If a copy of the MPL was not distributed with this
* file, You can obtain one at http://mozilla.org/MPL/2.0/.
*/

use crate::db::models::credit_card::{CreditCard, InternalCreditCard, NewCreditCardFields};
use crate::db::schema::CREDIT_CARD_COMMON_COLS;
use crate::error::*;

use rusqlite::{Connection, NO_PARAMS};
use sync_guid::Guid;
use types::Timestamp;

pub fn add_credit_card(
    conn: &Connection,
    new_credit_card_fields: NewCreditCardFields,
) -> Result<InternalCreditCard> {
    let tx = conn.unchecked_transaction()?;

    let credit_card = InternalCreditCard {
        guid: Guid::random(),
        fields: new_credit_card_fields,
        time_created: Timestamp::now(),
        time_last_used: Some(Timestamp::now()),
        time_last_modified: Timestamp::now(),
        times_used: 0,
        sync_change_counter: 1,
    };

    tx.execute_named(
        &format!(
            "INSERT OR IGNORE INTO credit_cards_data (
                {common_cols}
            ) VALUES (
                :guid,
                :cc_name,
                :cc_number,
                :cc_exp_month,
                :cc_exp_year,
                :cc_type,
                :time_created,
                :time_last_used,
                :time_last_modified,
                :times_used,
                :sync_change_counter
            )",
            common_cols = CREDIT_CARD_COMMON_COLS
        ),
        rusqlite::named_params! {
            ":guid": credit_card.guid,
            ":cc_name": credit_card.fields.cc_name,
            ":cc_number": credit_card.fields.cc_number,
            ":cc_exp_month": credit_card.fields.cc_exp_month,
            ":cc_exp_year": credit_card.fields.cc_exp_year,
            ":cc_type": credit_card.fields.cc_type,
            ":time_created": credit_card.time_created,
            ":time_last_used": credit_card.time_last_used,
            ":time_last_modified": credit_card.time_last_modified,
            ":times_used": credit_card.times_used,
            ":sync_change_counter": credit_card.sync_change_counter,
        },
    )?;

    tx.commit()?;
    Ok(credit_card)
}

pub fn get_credit_card(conn: &Connection, guid: String) -> Result<InternalCreditCard> {
    let tx = conn.unchecked_transaction()?;
    let sql = format!(
        "SELECT
            {common_cols}
        FROM credit_cards_data
        WHERE guid = :guid",
        common_cols = CREDIT_CARD_COMMON_COLS
    );

    let credit_card = tx.query_row(&sql, &[guid.as_str()], InternalCreditCard::from_row)?;

    tx.commit()?;
    Ok(credit_card)
}

pub fn get_all_credit_cards(conn: &Connection) -> Result<Vec<InternalCreditCard>> {
    let tx = conn.unchecked_transaction()?;
    let credit_cards;
    let sql = format!(
        "SELECT
            {common_cols}
        FROM credit_cards_data",
        common_cols = CREDIT_CARD_COMMON_COLS
    );

    {
        let mut stmt = tx.prepare(&sql)?;
        credit_cards = stmt
            .query_map(NO_PARAMS, InternalCreditCard::from_row)?
            .collect::<Result<Vec<InternalCreditCard>, _>>()?;
    }

    tx.commit()?;
    Ok(credit_cards)
}

pub fn update_credit_card(conn: &Connection, credit_card: &CreditCard) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_named(
        "UPDATE credit_cards_data
        SET cc_name                     = :cc_name,
            cc_number                   = :cc_number,
            cc_exp_month                = :cc_exp_month,
            cc_exp_year                 = :cc_exp_year,
            cc_type                     = :cc_type,
            time_last_modified          = :time_last_modified,
            sync_change_counter         = sync_change_counter + 1
        WHERE guid                      = :guid",
        rusqlite::named_params! {
            ":cc_name": credit_card.cc_name,
            ":cc_number": credit_card.cc_number,
            ":cc_exp_month": credit_card.cc_exp_month,
            ":cc_exp_year": credit_card.cc_exp_year,
            ":cc_type": credit_card.cc_type,
            ":time_last_modified": Timestamp::now(),
            ":guid": credit_card.guid.as_str(),
        },
    )?;

    tx.commit()?;
    Ok(())
}

pub fn delete_credit_card(conn: &Connection, guid: String) -> Result<bool> {
    let tx = conn.unchecked_transaction()?;

    // check that guid exists
    let exists = tx.query_row(
        "SELECT EXISTS (
            SELECT 1
            FROM credit_cards_data d
            WHERE guid = :guid
                AND NOT EXISTS (
                    SELECT 1
                    FROM   credit_cards_tombstones t
                    WHERE  d.guid = t.guid
                )
        )",
        &[guid.as_str()],
        |row| row.get(0),
    )?;

    // check that guid exists in the mirror
    let exists_in_mirror: bool = tx.query_row(
        "SELECT EXISTS (
            SELECT 1
            FROM credit_cards_mirror
            WHERE guid = :guid
        )",
        &[guid.as_str()],
        |row| row.get(0),
    )?;

    if exists {
        tx.execute_named(
            "DELETE FROM credit_cards_data
            WHERE guid = :guid",
            rusqlite::named_params! {
                ":guid": guid.as_str(),
            },
        )?;

        if exists_in_mirror {
            tx.execute_named(
                "INSERT OR IGNORE INTO credit_cards_tombstones (
                    guid,
                    time_deleted
                ) VALUES (
                    :guid,
                    :time_deleted
                )",
                rusqlite::named_params! {
                    ":guid": guid.as_str(),
                    ":time_deleted": Timestamp::now(),
                },
            )?;
        }
    }

    tx.commit()?;
    Ok(exists)
}

pub fn touch(conn: &Connection, guid: String) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    let now_ms = Timestamp::now();

    tx.execute_named(
        "UPDATE credit_cards_data
        SET time_last_used              = :time_last_used,
            times_used                  = times_used + 1,
            sync_change_counter         = sync_change_counter + 1
        WHERE guid                      = :guid",
        rusqlite::named_params! {
            ":time_last_used": now_ms,
            ":guid": guid.as_str(),
        },
    )?;

    tx.commit()?;
    Ok(())
}
