mod boot_handshake;
mod cross_core_sync;
mod lock_contention;
mod status_selection;
