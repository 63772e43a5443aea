mod test_join_welcomes;
mod test_relay_rules;
mod test_room_isolation;
