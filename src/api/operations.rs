//! Operations and permissions
//!
//! Every route declares the operation it performs; the table below is the
//! only place that decides which roles may perform it.

use std::fmt;

use crate::domain::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    RecordWash,
    GetTransaction,
    UpdateTransaction,
    RegisterCustomer,
    GetCustomer,
    ListPendingCommissions,
    PayCommissions,
    CheckIn,
    CheckOut,
    MarkLeave,
}

const ADMIN: &[Role] = &[Role::Admin];
const FRONT_DESK: &[Role] = &[Role::Admin, Role::Cashier];
const EVERYONE: &[Role] = &[Role::Admin, Role::Cashier, Role::Operator];
const SELF_SERVICE: &[Role] = &[Role::Admin, Role::Operator];

/// Allowed roles per operation
const PERMISSIONS: &[(Operation, &[Role])] = &[
    (Operation::RecordWash, FRONT_DESK),
    (Operation::GetTransaction, FRONT_DESK),
    (Operation::UpdateTransaction, ADMIN),
    (Operation::RegisterCustomer, FRONT_DESK),
    (Operation::GetCustomer, FRONT_DESK),
    (Operation::ListPendingCommissions, EVERYONE),
    (Operation::PayCommissions, ADMIN),
    (Operation::CheckIn, SELF_SERVICE),
    (Operation::CheckOut, SELF_SERVICE),
    (Operation::MarkLeave, ADMIN),
];

impl Operation {
    pub const ALL: [Operation; 10] = [
        Operation::RecordWash,
        Operation::GetTransaction,
        Operation::UpdateTransaction,
        Operation::RegisterCustomer,
        Operation::GetCustomer,
        Operation::ListPendingCommissions,
        Operation::PayCommissions,
        Operation::CheckIn,
        Operation::CheckOut,
        Operation::MarkLeave,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::RecordWash => "record_wash",
            Operation::GetTransaction => "get_transaction",
            Operation::UpdateTransaction => "update_transaction",
            Operation::RegisterCustomer => "register_customer",
            Operation::GetCustomer => "get_customer",
            Operation::ListPendingCommissions => "list_pending_commissions",
            Operation::PayCommissions => "pay_commissions",
            Operation::CheckIn => "check_in",
            Operation::CheckOut => "check_out",
            Operation::MarkLeave => "mark_leave",
        }
    }

    pub fn allowed_roles(&self) -> &'static [Role] {
        PERMISSIONS
            .iter()
            .find(|(op, _)| op == self)
            .map(|(_, roles)| *roles)
            .unwrap_or(&[])
    }

    pub fn permits(&self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
