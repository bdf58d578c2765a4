pub mod employees;
pub mod users;

pub use employees::EmployeesDao;
pub use users::UsersDao;
