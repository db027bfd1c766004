//! Built-in Accountsync schema upgrades.
//!
//! Applied in version order and tracked through the version store, so each
//! runs once per installation.

use accountsync_core::migration::{ChunkPlan, MigrationStep, Operation, Population};

const UPGRADE_1000_SQL: &str = r#"
ALTER TABLE `civicrm_account_contact`
  ADD COLUMN `connector_id` INT NULL COMMENT 'ID of connector. Relevant to connect to more than one account of the same type' AFTER `accounts_needs_update`,
  DROP INDEX `account_system_id`,
  ADD UNIQUE INDEX `account_system_id` (`accounts_contact_id`, `connector_id`, `plugin`),
  DROP INDEX `contact_id_plugin`,
  ADD UNIQUE INDEX `contact_id_plugin` (`contact_id`, `connector_id`, `plugin`);

ALTER TABLE `civicrm_account_invoice`
  ADD COLUMN `connector_id` INT NULL COMMENT 'ID of connector. Relevant to connect to more than one account of the same type' AFTER `accounts_needs_update`,
  DROP INDEX `account_system_id`,
  ADD UNIQUE INDEX `account_system_id` (`accounts_invoice_id`, `connector_id`, `plugin`),
  DROP INDEX `invoice_id_plugin`,
  ADD UNIQUE INDEX `invoice_id_plugin` (`contribution_id`, `connector_id`, `plugin`);
"#;

const UPGRADE_1100_SQL: &str = r#"
ALTER TABLE `civicrm_account_contact`
  ADD COLUMN `do_not_sync` TINYINT(4) DEFAULT 0 COMMENT 'Do not sync this contact' AFTER `accounts_needs_update`
"#;

// NULL status rows were missed by `accounts_status_id IN (...)` filters.
const UPGRADE_1200_SQL: &str = r#"
ALTER TABLE `civicrm_account_invoice`
  ALTER COLUMN `accounts_status_id` SET DEFAULT 0
"#;

const UPGRADE_1300_SQL: &str = r#"
UPDATE `civicrm_account_invoice`
SET `accounts_status_id` = 0
WHERE `accounts_status_id` IS NULL
  AND `id` BETWEEN ? AND ?
"#;

/// All built-in upgrades, ascending by version.
pub fn accountsync_upgrades() -> Vec<MigrationStep> {
    vec![
        MigrationStep::atomic(
            1000,
            "Add connector_id to account contacts and invoices",
            Operation::sql(UPGRADE_1000_SQL),
        ),
        MigrationStep::atomic(
            1100,
            "Add do_not_sync flag to account contacts",
            Operation::sql(UPGRADE_1100_SQL),
        ),
        MigrationStep::atomic(
            1200,
            "Default invoice accounts_status_id to 0",
            Operation::sql(UPGRADE_1200_SQL),
        ),
        MigrationStep::chunked(
            1300,
            "Backfill NULL invoice accounts_status_id with 0",
            ChunkPlan::new(
                Population::new("civicrm_account_invoice", "id"),
                Operation::sql(UPGRADE_1300_SQL),
            )
            .title("Backfill invoice status ({start} => {end})"),
        ),
    ]
}
